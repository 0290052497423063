//! Typed producers for user notifications and conversation activity.
//!
//! Every helper writes the payload into the event store (for SSE subscribers)
//! and forwards it through the relay broadcaster (for socket clients).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::constants::channels;
use crate::services::broadcaster::Broadcaster;
use crate::services::event_store::EventStore;

pub mod event_names {
    pub const NEW_NOTIFICATION: &str = "new-notification";
    pub const NOTIFICATION_COUNT: &str = "notification-count-update";
    pub const NOTIFICATION_READ: &str = "notification-read";
    pub const NOTIFICATIONS_UPDATE: &str = "notifications-update";
    pub const TYPING_INDICATOR: &str = "typing-indicator";
    pub const PRESENCE_UPDATE: &str = "presence-update";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub title: String,
    pub message: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_priority() -> String {
    "normal".to_string()
}

#[must_use]
pub fn user_channel(user_id: &str) -> String {
    format!("{}{user_id}", channels::USER_PREFIX)
}

#[must_use]
pub fn conversation_channel(conversation_id: &str) -> String {
    format!("{}{conversation_id}", channels::CONVERSATION_PREFIX)
}

pub struct NotificationService {
    store: Arc<dyn EventStore>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl NotificationService {
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    async fn emit(&self, channel: &str, event: &str, payload: Value) {
        self.store.publish(channel, event, payload.clone());
        metrics::counter!("events_published_total", "source" => "notifications").increment(1);

        let relay_message = match payload {
            Value::Object(mut map) => {
                map.insert("type".to_string(), Value::String(event.to_string()));
                Value::Object(map)
            }
            other => json!({ "type": event, "data": other }),
        };
        self.broadcaster.broadcast(channel, relay_message).await;
    }

    pub async fn notify_user(&self, user_id: &str, notification: &Notification) {
        info!(
            user_id,
            notification_id = %notification.id,
            "Broadcasting notification"
        );
        self.emit(
            &user_channel(user_id),
            event_names::NEW_NOTIFICATION,
            json!({
                "notification": notification,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }

    /// Delivers a batch as a single event so clients refresh their list once.
    pub async fn notify_user_bulk(&self, user_id: &str, notifications: &[Notification]) {
        info!(
            user_id,
            count = notifications.len(),
            "Broadcasting notification batch"
        );
        self.emit(
            &user_channel(user_id),
            event_names::NOTIFICATIONS_UPDATE,
            json!({
                "notifications": notifications,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }

    pub async fn notification_count(&self, user_id: &str, unread_count: u64) {
        self.emit(
            &user_channel(user_id),
            event_names::NOTIFICATION_COUNT,
            json!({
                "unreadCount": unread_count,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }

    pub async fn notification_read(&self, user_id: &str, notification_id: &str) {
        self.emit(
            &user_channel(user_id),
            event_names::NOTIFICATION_READ,
            json!({
                "notificationId": notification_id,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }

    pub async fn typing_indicator(
        &self,
        conversation_id: &str,
        user_id: &str,
        user_name: &str,
        is_typing: bool,
    ) {
        self.emit(
            &conversation_channel(conversation_id),
            event_names::TYPING_INDICATOR,
            json!({
                "userId": user_id,
                "userName": user_name,
                "isTyping": is_typing,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }

    pub async fn presence_update(
        &self,
        conversation_id: &str,
        user_id: &str,
        user_name: &str,
        is_online: bool,
    ) {
        self.emit(
            &conversation_channel(conversation_id),
            event_names::PRESENCE_UPDATE,
            json!({
                "userId": user_id,
                "userName": user_name,
                "isOnline": is_online,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        )
        .await;
    }
}
