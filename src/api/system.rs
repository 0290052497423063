//! Health and client configuration endpoints.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthStatus};
use crate::services::PollingConfig;

/// `GET /api/health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let stats = state.event_store().stats();

    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        event_logs: stats.logs,
        buffered_events: stats.records,
    }))
}

/// Polling intervals, retry and backoff settings for browser clients.
///
/// # Endpoint
/// `GET /api/config/polling`
pub async fn polling_config(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<PollingConfig>> {
    Json(ApiResponse::success(state.config().polling.clone()))
}
