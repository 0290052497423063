use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    Broadcaster, EventStore, MemoryEventStore, NotificationService, broadcaster,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub event_store: Arc<dyn EventStore>,

    pub broadcaster: Arc<dyn Broadcaster>,

    pub notifications: Arc<NotificationService>,
}

impl SharedState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let broadcaster = broadcaster::from_config(&config.broadcaster)?;
        Ok(Self::with_broadcaster(config, broadcaster))
    }

    /// Builds the state around a caller-supplied broadcaster, e.g. a test
    /// double.
    #[must_use]
    pub fn with_broadcaster(config: Config, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let event_store: Arc<dyn EventStore> =
            Arc::new(MemoryEventStore::new(config.events.log_capacity));

        let notifications = Arc::new(NotificationService::new(
            event_store.clone(),
            broadcaster.clone(),
        ));

        Self {
            config: Arc::new(config),
            event_store,
            broadcaster,
            notifications,
        }
    }
}
