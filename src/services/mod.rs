pub mod broadcaster;
pub use broadcaster::{Broadcaster, DisabledBroadcaster, HttpRelayBroadcaster};

pub mod event_store;
pub use event_store::{EventStore, EventStoreStats};

pub mod event_store_impl;
pub use event_store_impl::MemoryEventStore;

pub mod notifications;
pub use notifications::{Notification, NotificationService};

pub mod polling;
pub use polling::PollingConfig;

pub mod relay_hub;
pub use relay_hub::RelayHub;
