//! Connection registry and channel fan-out for the WebSocket relay.
//!
//! Every socket registers an outbound queue here. Channel and user indexes are
//! kept in step with the per-connection state so a disconnect removes the
//! connection from everything it joined.

use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::constants::channels;
use crate::domain::relay::{ClientMessage, RelayStats, ServerMessage};
use crate::domain::{ConnectionId, now_millis};

/// Outbound queue of serialized frames for one socket.
pub type Outbox = mpsc::UnboundedSender<String>;

struct Connection {
    outbox: Outbox,
    channels: HashSet<String>,
    user_id: Option<String>,
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<ConnectionId, Connection>,
    channels: HashMap<String, HashSet<ConnectionId>>,
    users: HashMap<String, HashSet<ConnectionId>>,
}

impl HubInner {
    fn detach_channel(&mut self, id: &ConnectionId, channel: &str) {
        if let Some(members) = self.channels.get_mut(channel) {
            members.remove(id);
            if members.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    fn detach_user(&mut self, id: &ConnectionId, user_id: &str) {
        if let Some(conns) = self.users.get_mut(user_id) {
            conns.remove(id);
            if conns.is_empty() {
                self.users.remove(user_id);
            }
        }
    }
}

#[derive(Default)]
pub struct RelayHub {
    inner: RwLock<HubInner>,
}

impl RelayHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HubInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HubInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: ConnectionId, outbox: Outbox) {
        let mut inner = self.write();
        inner.connections.insert(
            id,
            Connection {
                outbox,
                channels: HashSet::new(),
                user_id: None,
            },
        );
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("relay_connections_active").set(inner.connections.len() as f64);
    }

    /// Drops a connection and every channel/user membership it held.
    pub fn remove(&self, id: &ConnectionId) {
        let mut inner = self.write();
        let Some(conn) = inner.connections.remove(id) else {
            return;
        };

        for channel in &conn.channels {
            inner.detach_channel(id, channel);
        }
        if let Some(user_id) = &conn.user_id {
            inner.detach_user(id, user_id);
        }

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("relay_connections_active").set(inner.connections.len() as f64);
        debug!(connection_id = %id, "Cleaned up connection");
    }

    /// Returns false when the connection is unknown.
    pub fn subscribe(&self, id: &ConnectionId, channel: &str) -> bool {
        let mut inner = self.write();
        let Some(conn) = inner.connections.get_mut(id) else {
            return false;
        };
        conn.channels.insert(channel.to_string());
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(id.clone());

        info!(connection_id = %id, channel, "Subscribed");
        true
    }

    pub fn unsubscribe(&self, id: &ConnectionId, channel: &str) {
        let mut inner = self.write();
        if let Some(conn) = inner.connections.get_mut(id) {
            conn.channels.remove(channel);
        }
        inner.detach_channel(id, channel);
        info!(connection_id = %id, channel, "Unsubscribed");
    }

    pub fn authenticate(&self, id: &ConnectionId, user_id: &str) -> bool {
        let mut inner = self.write();
        let Some(conn) = inner.connections.get_mut(id) else {
            return false;
        };
        let previous = conn.user_id.replace(user_id.to_string());
        if let Some(previous) = previous {
            inner.detach_user(id, &previous);
        }
        inner
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(id.clone());
        true
    }

    #[must_use]
    pub fn user_of(&self, id: &ConnectionId) -> Option<String> {
        self.read()
            .connections
            .get(id)
            .and_then(|conn| conn.user_id.clone())
    }

    /// Queues a message for one connection. Returns false when the connection
    /// is gone.
    pub fn send_to(&self, id: &ConnectionId, message: &ServerMessage) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Failed to serialize message");
                return false;
            }
        };

        let inner = self.read();
        inner
            .connections
            .get(id)
            .is_some_and(|conn| conn.outbox.send(text).is_ok())
    }

    /// Delivers `message` to every connection subscribed to `channel`.
    ///
    /// Object payloads get a `channel` field; anything else is wrapped as
    /// `{"channel", "data"}`. Returns the number of queues that accepted it.
    pub fn broadcast(&self, channel: &str, message: Value) -> usize {
        let envelope = match message {
            Value::Object(mut map) => {
                map.insert("channel".to_string(), Value::String(channel.to_string()));
                Value::Object(map)
            }
            other => json!({ "channel": channel, "data": other }),
        };

        let text = envelope.to_string();
        let inner = self.read();

        let Some(members) = inner.channels.get(channel) else {
            debug!(channel, "No subscribers for channel");
            return 0;
        };

        let delivered = members
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .filter(|conn| conn.outbox.send(text.clone()).is_ok())
            .count();

        metrics::counter!("relay_messages_delivered_total").increment(delivered as u64);
        debug!(channel, delivered, "Broadcast delivered");
        delivered
    }

    /// Applies one inbound client message.
    pub fn handle(&self, id: &ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Ping => {
                self.send_to(
                    id,
                    &ServerMessage::Pong {
                        timestamp: now_millis(),
                    },
                );
            }
            ClientMessage::Auth { user_id } => {
                info!(connection_id = %id, user_id, "Authenticated connection");
                if self.authenticate(id, &user_id) {
                    self.send_to(
                        id,
                        &ServerMessage::AuthSuccess {
                            user_id,
                            timestamp: now_millis(),
                        },
                    );
                }
            }
            ClientMessage::Subscribe { channel } => {
                self.subscribe(id, &channel);
            }
            ClientMessage::Unsubscribe { channel } => {
                self.unsubscribe(id, &channel);
            }
            ClientMessage::Typing {
                conversation_id,
                user_id,
                user_name,
                user_image,
            } => {
                let user_id = user_id
                    .filter(|u| !u.is_empty())
                    .or_else(|| self.user_of(id));
                self.broadcast(
                    &format!("{}{conversation_id}", channels::TYPING_PREFIX),
                    json!({
                        "type": "user_typing",
                        "conversationId": conversation_id,
                        "userId": user_id,
                        "userName": user_name,
                        "userImage": user_image,
                        "timestamp": now_millis(),
                    }),
                );
            }
            ClientMessage::TypingStop {
                conversation_id,
                user_id,
            } => {
                let user_id = user_id
                    .filter(|u| !u.is_empty())
                    .or_else(|| self.user_of(id));
                self.broadcast(
                    &format!("{}{conversation_id}", channels::TYPING_PREFIX),
                    json!({
                        "type": "user_stopped_typing",
                        "conversationId": conversation_id,
                        "userId": user_id,
                        "timestamp": now_millis(),
                    }),
                );
            }
            ClientMessage::Presence {
                conversation_id,
                is_online,
            } => {
                self.broadcast(
                    &format!("{}{conversation_id}", channels::PRESENCE_PREFIX),
                    json!({
                        "type": "presence",
                        "conversationId": conversation_id,
                        "isOnline": is_online,
                        "timestamp": now_millis(),
                    }),
                );
            }
            ClientMessage::Broadcast { channel, message } => {
                info!(connection_id = %id, channel, "Client broadcast");
                self.broadcast(&channel, message);
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> RelayStats {
        let inner = self.read();
        RelayStats {
            total_connections: inner.connections.len(),
            total_users: inner.users.len(),
            total_channels: inner.channels.len(),
        }
    }
}
