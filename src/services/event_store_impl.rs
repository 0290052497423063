//! In-memory implementation of the `EventStore` trait.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::domain::events::EventRecord;
use crate::domain::{EventKey, now_millis};
use crate::services::event_store::{EventStore, EventStoreStats};

#[derive(Debug, Default)]
struct EventLog {
    records: VecDeque<EventRecord>,
    next_seq: u64,
}

impl EventLog {
    fn append(&mut self, data: Value, now: i64, capacity: usize) -> EventRecord {
        // Keep timestamps non-decreasing even if the wall clock steps back.
        let timestamp = self
            .records
            .back()
            .map_or(now, |last| now.max(last.timestamp));

        self.next_seq += 1;
        let record = EventRecord {
            seq: self.next_seq,
            data,
            timestamp,
        };
        self.records.push_back(record.clone());

        while self.records.len() > capacity {
            self.records.pop_front();
        }

        record
    }
}

pub struct MemoryEventStore {
    logs: RwLock<HashMap<EventKey, EventLog>>,
    capacity: usize,
}

impl MemoryEventStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn publish_at(&self, channel: &str, event: &str, payload: Value, now: i64) -> EventRecord {
        let key = EventKey::new(channel, event);
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        let log = logs.entry(key).or_default();
        let record = log.append(payload, now, self.capacity);

        debug!(
            channel,
            event,
            seq = record.seq,
            buffered = log.records.len(),
            "Stored event"
        );

        record
    }

    fn collect<F>(&self, channel: &str, event: &str, keep: F) -> Vec<EventRecord>
    where
        F: Fn(&EventRecord) -> bool,
    {
        let key = EventKey::new(channel, event);
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        logs.get(&key)
            .map(|log| log.records.iter().filter(|r| keep(r)).cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new(crate::constants::events::LOG_CAPACITY)
    }
}

impl EventStore for MemoryEventStore {
    fn publish(&self, channel: &str, event: &str, payload: Value) -> EventRecord {
        self.publish_at(channel, event, payload, now_millis())
    }

    fn read_since(&self, channel: &str, event: &str, since: i64) -> Vec<EventRecord> {
        self.collect(channel, event, |r| r.timestamp > since)
    }

    fn read_after(&self, channel: &str, event: &str, after: u64) -> Vec<EventRecord> {
        self.collect(channel, event, |r| r.seq > after)
    }

    fn stats(&self) -> EventStoreStats {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        EventStoreStats {
            logs: logs.len(),
            records: logs.values().map(|log| log.records.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_since_zero_returns_everything_in_order() {
        let store = MemoryEventStore::default();
        for i in 0..10 {
            store.publish("post:1", "comment:new", json!({ "i": i }));
        }

        let records = store.read_since("post:1", "comment:new", 0);
        assert_eq!(records.len(), 10);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.data, json!({ "i": i }));
        }
    }

    #[test]
    fn unknown_key_is_empty() {
        let store = MemoryEventStore::default();
        store.publish("a", "b", json!(1));
        assert!(store.read_since("a", "c", 0).is_empty());
        assert!(store.read_after("x", "b", 0).is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryEventStore::default();
        store.publish("chat", "message", json!("m"));
        store.publish("chat", "reaction", json!("r"));

        let messages = store.read_since("chat", "message", 0);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, json!("m"));
    }

    #[test]
    fn hundred_and_first_publish_evicts_oldest() {
        let store = MemoryEventStore::default();
        for i in 0..101 {
            store.publish("c", "e", json!(i));
        }

        let records = store.read_since("c", "e", 0);
        assert_eq!(records.len(), 100);
        assert_eq!(records[0].data, json!(1));
        assert_eq!(records[99].data, json!(100));
    }

    #[test]
    fn publishing_105_keeps_latest_100() {
        let store = MemoryEventStore::default();
        for i in 0..105 {
            store.publish("c", "e", json!(i));
        }

        let records = store.read_since("c", "e", 0);
        assert_eq!(records.len(), 100);
        assert_eq!(records.first().unwrap().data, json!(5));
        assert_eq!(records.last().unwrap().data, json!(104));
        assert_eq!(records.last().unwrap().seq, 105);
    }

    #[test]
    fn read_since_last_timestamp_is_empty() {
        let store = MemoryEventStore::default();
        store.publish("c", "e", json!(1));
        let last = store.publish("c", "e", json!(2));

        assert!(store.read_since("c", "e", last.timestamp).is_empty());
    }

    #[test]
    fn read_since_filters_strictly_greater() {
        let store = MemoryEventStore::default();
        store.publish_at("c", "e", json!("old"), 1_000);
        store.publish_at("c", "e", json!("mid"), 2_000);
        store.publish_at("c", "e", json!("new"), 3_000);

        let records = store.read_since("c", "e", 2_000);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, json!("new"));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let store = MemoryEventStore::default();
        store.publish_at("c", "e", json!(1), 5_000);
        let second = store.publish_at("c", "e", json!(2), 4_000);

        assert_eq!(second.timestamp, 5_000);
        let records = store.read_since("c", "e", 0);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn read_after_uses_sequence_numbers() {
        let store = MemoryEventStore::default();
        for i in 0..5 {
            store.publish_at("c", "e", json!(i), 1_000);
        }

        let records = store.read_after("c", "e", 3);
        assert_eq!(
            records.iter().map(|r| r.seq).collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn stats_count_logs_and_records() {
        let store = MemoryEventStore::new(2);
        store.publish("a", "x", json!(1));
        store.publish("a", "x", json!(2));
        store.publish("a", "x", json!(3));
        store.publish("b", "y", json!(1));

        assert_eq!(
            store.stats(),
            EventStoreStats {
                logs: 2,
                records: 3
            }
        );
    }
}
