//! Inbound registry webhooks.
//!
//! Each configured `[[webhooks]]` entry becomes a `POST` route. The body is
//! turned into a [`ChangeEvent`] by the normalizer registered for the
//! webhook's `type` and dispatched exactly like a poller-detected change.

pub mod acr;
pub mod docker;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftwatch_core::ChangeEvent;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
}

/// Turns a raw webhook body into a change event for `event_name`.
///
/// `Ok(None)` means the payload is well-formed but not a push (a ping or a
/// delete) and should be acknowledged without dispatching.
pub type Normalizer =
    fn(event_name: &str, body: &[u8]) -> Result<Option<ChangeEvent>, NormalizeError>;

/// One mounted webhook.
#[derive(Clone)]
pub struct WebhookRoute {
    pub path: String,
    pub event_name: String,
    pub kind: String,
    pub normalizer: Normalizer,
}

/// Body of a `202 Accepted` webhook response.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAccepted {
    pub event_name: String,
    pub artifact: String,
    pub version: String,
    pub delivered: usize,
    pub failed: usize,
}

/// Mount every webhook route.
pub fn router(routes: Vec<WebhookRoute>) -> Router<AppState> {
    routes.into_iter().fold(Router::new(), |router, route| {
        tracing::info!(
            path = %route.path,
            event_name = %route.event_name,
            kind = %route.kind,
            "Mounting webhook"
        );
        let path = route.path.clone();
        let route = Arc::new(route);
        router.route(
            &path,
            axum::routing::post(move |State(state): State<AppState>, body: Bytes| {
                let route = Arc::clone(&route);
                async move { receive(state, &route, &body).await }
            }),
        )
    })
}

async fn receive(
    state: AppState,
    route: &WebhookRoute,
    body: &[u8],
) -> Result<Response, AppError> {
    let event = (route.normalizer)(&route.event_name, body).map_err(|e| {
        tracing::warn!(
            event_name = %route.event_name,
            path = %route.path,
            error = %e,
            "Rejected webhook payload"
        );
        AppError::BadRequest(format!("malformed {} webhook: {e}", route.kind))
    })?;

    let Some(event) = event else {
        tracing::debug!(event_name = %route.event_name, "Ignoring non-push webhook");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    tracing::info!(
        event_name = %event.event_name,
        artifact = %event.artifact,
        version = %event.version,
        "Webhook received"
    );
    let report = state.dispatcher.dispatch(&event).await;
    let body = WebhookAccepted {
        delivered: report.delivered(),
        failed: report.failed(),
        event_name: event.event_name,
        artifact: event.artifact,
        version: event.version,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Read an optional string field, treating blank as missing.
pub(crate) fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, NormalizeError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(NormalizeError::MissingField(field))
}
