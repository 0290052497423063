use anyhow::Context;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::Config;

pub async fn cmd_publish(
    config: &Config,
    channel: &str,
    event: &str,
    data: Option<&str>,
    url: Option<&str>,
) -> anyhow::Result<()> {
    let data: Value = match data {
        Some(raw) => serde_json::from_str(raw).context("Payload is not valid JSON")?,
        None => Value::Null,
    };

    let endpoint = url.map_or_else(|| publish_url(config), str::to_string);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .post(&endpoint)
        .json(&json!({ "channel": channel, "event": event, "data": data }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {endpoint}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.is_success() {
        println!("✓ Published {event} to {channel}");
    } else {
        anyhow::bail!("Publish failed ({status}): {body}");
    }

    Ok(())
}

/// A wildcard bind address is not dialable, so fall back to loopback.
fn publish_url(config: &Config) -> String {
    let host = match config.server.host.as_str() {
        "0.0.0.0" | "::" | "" => "localhost",
        other => other,
    };
    format!("http://{host}:{}/api/events", config.server.port)
}
