//! Domain service for buffering recent events per channel/event pair.
//!
//! Late-joining SSE subscribers replay from this buffer. Implementations are
//! injected as `Arc<dyn EventStore>` so the in-memory store can be swapped for
//! a durable broker or a test double.

use serde::Serialize;
use serde_json::Value;

use crate::domain::events::EventRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventStoreStats {
    pub logs: usize,
    pub records: usize,
}

pub trait EventStore: Send + Sync {
    /// Appends `payload` to the log for `channel:event`, creating the log if
    /// needed and evicting the oldest records beyond capacity.
    ///
    /// Never fails. Returns the stored record.
    fn publish(&self, channel: &str, event: &str, payload: Value) -> EventRecord;

    /// Returns the records with `timestamp > since`, oldest first.
    ///
    /// An unknown key yields an empty vector.
    fn read_since(&self, channel: &str, event: &str, since: i64) -> Vec<EventRecord>;

    /// Returns the records with `seq > after`, oldest first.
    fn read_after(&self, channel: &str, event: &str, after: u64) -> Vec<EventRecord>;

    fn stats(&self) -> EventStoreStats;
}
