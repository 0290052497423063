//! Records held by the event store and the delivery cursor used by SSE
//! subscribers.

use serde::Serialize;
use serde_json::Value;

/// One published payload in an event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Position within its log, starting at 1.
    pub seq: u64,
    pub data: Value,
    /// Epoch milliseconds. Non-decreasing within a log.
    pub timestamp: i64,
}

/// Where an SSE connection is in its log.
///
/// A connection starts at the client-supplied `since` timestamp and switches
/// to the sequence of the last record it delivered, so nothing is sent twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Since(i64),
    After(u64),
}

impl Cursor {
    /// Moves the cursor past the given batch.
    #[must_use]
    pub fn advance(self, delivered: &[EventRecord]) -> Self {
        delivered.last().map_or(self, |last| Self::After(last.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(seq: u64, timestamp: i64) -> EventRecord {
        EventRecord {
            seq,
            data: json!({ "n": seq }),
            timestamp,
        }
    }

    #[test]
    fn cursor_stays_put_on_empty_batch() {
        let cursor = Cursor::Since(42);
        assert_eq!(cursor.advance(&[]), Cursor::Since(42));
    }

    #[test]
    fn cursor_moves_to_last_delivered_seq() {
        let cursor = Cursor::Since(0).advance(&[record(1, 10), record(2, 11)]);
        assert_eq!(cursor, Cursor::After(2));
        assert_eq!(cursor.advance(&[record(3, 12)]), Cursor::After(3));
    }
}
