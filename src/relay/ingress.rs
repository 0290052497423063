use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::RelayState;
use crate::api::{ApiError, ApiResponse, render_metrics};
use crate::domain::relay::{BroadcastRequest, RelayStats};

#[derive(Debug, Serialize)]
pub struct BroadcastReceipt {
    pub delivered: usize,
}

/// Fans a producer's message out to the channel's sockets.
///
/// # Endpoint
/// `POST /broadcast`
pub async fn broadcast(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BroadcastReceipt>>, ApiError> {
    let Json(request) = payload?;

    if request.kind != "broadcast" {
        return Err(ApiError::validation(format!(
            "Unsupported message type: {}",
            request.kind
        )));
    }

    let channel = request.channel.trim();
    if channel.is_empty() {
        return Err(ApiError::validation("Missing channel"));
    }

    let delivered = state.hub.broadcast(channel, request.message);
    info!(channel, delivered, "Ingress broadcast");

    Ok(Json(ApiResponse::success(BroadcastReceipt { delivered })))
}

/// `GET /stats`
pub async fn stats(State(state): State<Arc<RelayState>>) -> Json<RelayStats> {
    Json(state.hub.stats())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<RelayState>>) -> String {
    render_metrics(state.prometheus_handle.as_ref())
}
