use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchStatsSnapshot;
use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub pollers: usize,
    pub webhooks: usize,
    pub dispatch: DispatchStatsSnapshot,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        pollers: state.poller_count,
        webhooks: state.webhook_count,
        dispatch: state.dispatcher.stats(),
    })
}

/// Liveness probe.
pub async fn status_check() -> &'static str {
    "ok"
}
