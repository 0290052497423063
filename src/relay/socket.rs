use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::RelayState;
use crate::domain::relay::{ClientMessage, ServerMessage};
use crate::domain::{ConnectionId, now_millis};
use crate::services::RelayHub;

#[derive(Debug, Deserialize)]
pub struct UpgradeQuery {
    /// Channel to join as soon as the socket opens.
    pub channel: Option<String>,
}

pub async fn ws_upgrade(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<UpgradeQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ws.max_message_size(state.config.max_payload_bytes)
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(state, socket, query.channel, origin))
}

async fn handle_socket(
    state: Arc<RelayState>,
    socket: WebSocket,
    channel: Option<String>,
    origin: Option<String>,
) {
    let id = ConnectionId::random();
    info!(connection_id = %id, origin = ?origin, "New connection");

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.hub.register(id.clone(), tx);

    if let Some(channel) = channel.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        state.hub.subscribe(&id, channel);
    }

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                warn!(connection_id = %writer_id, error = %e, "Failed to send frame");
                break;
            }
        }
    });

    spawn_welcome(
        state.hub.clone(),
        id.clone(),
        Duration::from_millis(state.config.welcome_delay_ms),
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&state.hub, &id, text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(&state.hub, &id, text),
                Err(e) => warn!(connection_id = %id, error = %e, "Ignoring non-UTF-8 frame"),
            },
            Ok(Message::Close(close)) => {
                let (code, reason) = close
                    .map(|f| (f.code, f.reason.to_string()))
                    .unwrap_or_default();
                info!(
                    connection_id = %id,
                    code,
                    reason = %reason,
                    was_clean = code == 1000,
                    "Connection closed"
                );
                break;
            }
            // Protocol-level ping/pong is answered by axum.
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(connection_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.hub.remove(&id);
    writer.abort();
}

fn spawn_welcome(hub: Arc<RelayHub>, id: ConnectionId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let welcome = ServerMessage::Connected {
            connection_id: id.clone(),
            timestamp: now_millis(),
        };
        if hub.send_to(&id, &welcome) {
            debug!(connection_id = %id, "Welcome sent");
        } else {
            debug!(connection_id = %id, "Connection not ready for welcome message");
        }
    });
}

/// Parse failures are logged; the connection stays open.
fn handle_text(hub: &RelayHub, id: &ConnectionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => {
            debug!(connection_id = %id, message = ?message, "Client message");
            hub.handle(id, message);
        }
        Err(e) => warn!(connection_id = %id, error = %e, "Failed to parse client message"),
    }
}
