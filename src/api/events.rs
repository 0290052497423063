//! Event publish and SSE subscribe endpoints.
//!
//! Subscribers replay buffered records newer than `since`, then poll their
//! log on a fixed interval. Each connection keeps its own cursor, so a record
//! is written to a given stream at most once.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderValue, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::validation::{parse_since, require_channel_and_event};
use super::{ApiError, ApiResponse, AppState, PublishEventRequest, SubscribeQuery};
use crate::domain::events::{Cursor, EventRecord};
use crate::services::EventStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(subscribe).post(publish))
}

/// Appends one record to the `channel:event` log.
///
/// # Endpoint
/// `POST /api/events`
pub async fn publish(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublishEventRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let Json(request) = payload?;
    let (channel, event) =
        require_channel_and_event(request.channel.as_deref(), request.event.as_deref())?;

    let record = state.event_store().publish(channel, event, request.data);
    metrics::counter!("events_published_total", "source" => "api").increment(1);
    info!(channel, event, seq = record.seq, "Event published");

    Ok(Json(ApiResponse::ok()))
}

/// Opens a `text/event-stream` for one `channel:event` log.
///
/// # Endpoint
/// `GET /api/events?channel=&event=&since=`
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Response, ApiError> {
    let (channel, event) =
        require_channel_and_event(query.channel.as_deref(), query.event.as_deref())?;
    let since = parse_since(query.since.as_deref())?;

    let events_config = &state.config().events;
    let subscription = Subscription::open(
        state.event_store().clone(),
        channel,
        event,
        since,
        Duration::from_millis(events_config.poll_interval_ms.max(1)),
    );

    let headers = [(header::CONNECTION, HeaderValue::from_static("keep-alive"))];
    let sse = Sse::new(subscription.into_stream());

    let response = if events_config.keep_alive_seconds > 0 {
        let keep_alive =
            KeepAlive::new().interval(Duration::from_secs(events_config.keep_alive_seconds));
        (headers, sse.keep_alive(keep_alive)).into_response()
    } else {
        (headers, sse).into_response()
    };

    Ok(response)
}

/// Logs and counts the stream's lifetime; dropped with the stream when the
/// client disconnects.
struct StreamGuard {
    channel: String,
    event: String,
}

impl StreamGuard {
    fn new(channel: &str, event: &str) -> Self {
        info!(channel, event, "Starting event stream");
        metrics::gauge!("sse_connections_active").increment(1.0);
        Self {
            channel: channel.to_string(),
            event: event.to_string(),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::gauge!("sse_connections_active").decrement(1.0);
        info!(
            channel = %self.channel,
            event = %self.event,
            "Closing event stream"
        );
    }
}

struct Subscription {
    store: Arc<dyn EventStore>,
    cursor: Cursor,
    ticker: Interval,
    pending: VecDeque<EventRecord>,
    guard: StreamGuard,
}

impl Subscription {
    /// Reads the backlog newer than `since` right away; later records arrive
    /// through polling.
    fn open(
        store: Arc<dyn EventStore>,
        channel: &str,
        event: &str,
        since: i64,
        poll_interval: Duration,
    ) -> Self {
        let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut subscription = Self {
            store,
            cursor: Cursor::Since(since),
            ticker,
            pending: VecDeque::new(),
            guard: StreamGuard::new(channel, event),
        };
        subscription.poll();
        debug!(
            channel,
            event,
            backlog = subscription.pending.len(),
            "Replaying buffered events"
        );
        subscription
    }

    fn poll(&mut self) {
        let channel = self.guard.channel.as_str();
        let event = self.guard.event.as_str();

        let batch = match self.cursor {
            Cursor::Since(since) => self.store.read_since(channel, event, since),
            Cursor::After(seq) => {
                let batch = self.store.read_after(channel, event, seq);
                if let Some(first) = batch.first()
                    && first.seq > seq + 1
                {
                    warn!(
                        channel,
                        event,
                        skipped = first.seq - seq - 1,
                        "Subscriber fell behind, evicted events were skipped"
                    );
                }
                batch
            }
        };

        self.cursor = self.cursor.advance(&batch);
        self.pending.extend(batch);
    }

    fn into_stream(self) -> impl Stream<Item = Result<Event, Infallible>> + Send {
        stream::unfold(self, |mut sub| async move {
            loop {
                if let Some(record) = sub.pending.pop_front() {
                    let frame = Event::default().data(record.data.to_string());
                    return Some((Ok(frame), sub));
                }
                sub.ticker.tick().await;
                sub.poll();
            }
        })
    }
}
