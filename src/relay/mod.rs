//! Standalone WebSocket relay.
//!
//! Two listeners share one [`RelayHub`]: the public socket endpoint and the
//! internal broadcast ingress the main application posts to.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::logging_middleware;
use crate::config::RelayConfig;
use crate::services::RelayHub;

mod ingress;
mod socket;

pub use ingress::BroadcastReceipt;

pub struct RelayState {
    pub hub: Arc<RelayHub>,

    pub config: RelayConfig,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl RelayState {
    #[must_use]
    pub fn new(config: RelayConfig, prometheus_handle: Option<PrometheusHandle>) -> Arc<Self> {
        Arc::new(Self {
            hub: Arc::new(RelayHub::new()),
            config,
            prometheus_handle,
        })
    }
}

/// Socket endpoint, mounted at `relay.ws_path`.
pub fn ws_router(state: Arc<RelayState>) -> Router {
    let path = state.config.ws_path.clone();

    Router::new()
        .route(&path, get(socket::ws_upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Internal ingress: `POST /broadcast`, `GET /stats` and `GET /metrics`.
pub fn ingress_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/broadcast", post(ingress::broadcast))
        .route("/stats", get(ingress::stats))
        .route("/metrics", get(ingress::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware))
}
