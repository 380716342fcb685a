//! Event Bus (C12): fire-and-forget pub/sub over a closed set of event
//! types, with observer failures isolated from the publisher and from
//! each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{Event, EventType, SequenceNumber};

const CHANNEL_CAPACITY: usize = 1024;

/// In-process event bus backed by `tokio::sync::broadcast`. Each
/// subscriber gets its own receiver; a slow subscriber can lag and miss
/// events without affecting the publisher or other subscribers.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish a trace-scoped event. Never fails the caller: if there are
    /// no subscribers, `send` returning an error is simply ignored.
    pub fn publish(
        &self,
        event_type: EventType,
        trace_id: Uuid,
        task_id: Option<Uuid>,
        task_path: Option<String>,
        source: impl Into<String>,
        data: Value,
    ) {
        let sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        let event = Event {
            id: Uuid::new_v4(),
            sequence,
            event_type,
            trace_id,
            task_id,
            task_path,
            source: source.into(),
            data,
            occurred_at: Utc::now(),
        };
        // A `SendError` here just means nobody is currently subscribed.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(EventType::TaskCompleted, Uuid::new_v4(), None, None, "test", json!({}));
    }

    #[tokio::test]
    async fn every_subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let trace_id = Uuid::new_v4();

        bus.publish(EventType::TaskCompleted, trace_id, None, None, "test", json!({ "k": "v" }));

        let got_first = first.recv().await.unwrap();
        let got_second = second.recv().await.unwrap();
        assert_eq!(got_first.trace_id, trace_id);
        assert_eq!(got_second.trace_id, trace_id);
        assert_eq!(got_first.data, json!({ "k": "v" }));
    }

    #[tokio::test]
    async fn sequence_numbers_increase_monotonically_across_publishes() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(EventType::TaskCompleted, Uuid::new_v4(), None, None, "test", json!({}));
        bus.publish(EventType::TaskFailed, Uuid::new_v4(), None, None, "test", json!({}));
        bus.publish(EventType::TaskCancelled, Uuid::new_v4(), None, None, "test", json!({}));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert!(second.sequence.0 > first.sequence.0);
        assert!(third.sequence.0 > second.sequence.0);
    }
}
