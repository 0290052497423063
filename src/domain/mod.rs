//! Domain types for real-time event delivery.
//!
//! Newtype wrappers keep event log keys and relay connection ids from being
//! mixed up with arbitrary strings.

pub mod events;
pub mod relay;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants;

/// Key of an event log: the channel name and the event name joined by `:`.
///
/// # Examples
///
/// ```rust
/// use campus_realtime::domain::EventKey;
///
/// let key = EventKey::new("post:1", "bookmark:updated");
/// assert_eq!(key.as_str(), "post:1:bookmark:updated");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(String);

impl EventKey {
    #[must_use]
    pub fn new(channel: &str, event: &str) -> Self {
        let mut key = String::with_capacity(channel.len() + event.len() + 1);
        key.push_str(channel);
        key.push(constants::events::KEY_SEPARATOR);
        key.push_str(event);
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier handed to each relay connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generates a random lowercase alphanumeric id.
    #[must_use]
    pub fn random() -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(constants::relay::CONNECTION_ID_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_key_joins_channel_and_event() {
        let key = EventKey::new("community-7", "message:new");
        assert_eq!(key.as_str(), "community-7:message:new");
        assert_eq!(key.to_string(), "community-7:message:new");
    }

    #[test]
    fn connection_id_shape() {
        let id = ConnectionId::random();
        assert_eq!(id.as_str().len(), 13);
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
        assert_ne!(id, ConnectionId::random());
    }

    #[test]
    fn connection_id_serializes_as_plain_string() {
        let id = ConnectionId::from("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
