pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factories;
pub mod health;
pub mod poller;
pub mod poller_manager;
pub mod startup;
pub mod state;
pub mod validator;
pub mod webhooks;

use axum::Router;
use tower_http::trace::TraceLayer;

use error::AppError;
use state::AppState;
use webhooks::WebhookRoute;

/// Build the Axum router: health endpoints plus one route per webhook.
pub fn build_app(state: AppState, routes: Vec<WebhookRoute>) -> Router<()> {
    Router::new()
        .route("/health", axum::routing::get(health::health_check))
        .route("/status", axum::routing::get(health::status_check))
        .merge(webhooks::router(routes))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
