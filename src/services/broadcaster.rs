//! Fire-and-forget bridge from the main application to the WebSocket relay.
//!
//! Delivery is at-most-once. A relay that is down, slow or returns an error
//! status costs the caller a log line and nothing else.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BroadcasterConfig;
use crate::domain::relay::BroadcastRequest;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Relay request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relay responded with status {0}")]
    Status(StatusCode),
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Forwards `message` to the sockets subscribed to `channel`.
    ///
    /// Failures are logged and swallowed.
    async fn broadcast(&self, channel: &str, message: Value);
}

#[derive(Clone)]
pub struct HttpRelayBroadcaster {
    client: Client,
    relay_url: String,
}

impl HttpRelayBroadcaster {
    pub fn new(config: &BroadcasterConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("campus-realtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build relay HTTP client: {e}"))?;

        Ok(Self {
            client,
            relay_url: config.relay_url.clone(),
        })
    }

    #[must_use]
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub async fn try_broadcast(&self, channel: &str, message: Value) -> Result<(), BroadcastError> {
        let body = BroadcastRequest::new(channel, message);

        let response = self.client.post(&self.relay_url).json(&body).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(BroadcastError::Status(status))
        }
    }
}

/// Returns as soon as the request is queued; the POST runs on its own task.
#[async_trait]
impl Broadcaster for HttpRelayBroadcaster {
    async fn broadcast(&self, channel: &str, message: Value) {
        let relay = self.clone();
        let channel = channel.to_string();

        tokio::spawn(async move {
            match relay.try_broadcast(&channel, message).await {
                Ok(()) => debug!(channel, "Broadcast sent to relay"),
                Err(e) => {
                    metrics::counter!("relay_broadcast_failures_total").increment(1);
                    warn!(channel, error = %e, "Relay broadcast dropped");
                }
            }
        });
    }
}

/// Used when `broadcaster.enabled = false`.
pub struct DisabledBroadcaster;

#[async_trait]
impl Broadcaster for DisabledBroadcaster {
    async fn broadcast(&self, channel: &str, _message: Value) {
        debug!(channel, "Relay broadcasting disabled, dropping message");
    }
}

/// Builds the broadcaster described by the config.
pub fn from_config(
    config: &BroadcasterConfig,
) -> anyhow::Result<std::sync::Arc<dyn Broadcaster>> {
    if config.enabled {
        let broadcaster = HttpRelayBroadcaster::new(config)?;
        info!(relay_url = broadcaster.relay_url(), "Relay broadcaster enabled");
        Ok(std::sync::Arc::new(broadcaster))
    } else {
        Ok(std::sync::Arc::new(DisabledBroadcaster))
    }
}
