//! Wire messages exchanged with WebSocket relay clients and the broadcast
//! ingress.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ConnectionId;

/// Messages a socket client may send to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Ping,
    Auth {
        user_id: String,
    },
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Typing {
        conversation_id: String,
        user_id: Option<String>,
        user_name: Option<String>,
        user_image: Option<String>,
    },
    TypingStop {
        conversation_id: String,
        user_id: Option<String>,
    },
    Presence {
        conversation_id: String,
        is_online: bool,
    },
    Broadcast {
        channel: String,
        message: Value,
    },
}

/// Messages the relay addresses to a single connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Connected {
        connection_id: ConnectionId,
        timestamp: i64,
    },
    Pong {
        timestamp: i64,
    },
    AuthSuccess {
        user_id: String,
        timestamp: i64,
    },
}

/// Body of `POST /broadcast` on the relay ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    #[serde(rename = "type", default = "broadcast_kind")]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub message: Value,
}

fn broadcast_kind() -> String {
    "broadcast".to_string()
}

impl BroadcastRequest {
    #[must_use]
    pub fn new(channel: impl Into<String>, message: Value) -> Self {
        Self {
            kind: broadcast_kind(),
            channel: channel.into(),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    pub total_connections: usize,
    pub total_users: usize,
    pub total_channels: usize,
}
