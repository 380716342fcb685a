//! Port for the Message Broker (C2): at-least-once pub/sub with a
//! delayed-publish escape hatch, used for `task.scheduled` and
//! `task.status_update`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::DomainResult;

/// A single delivered message: the raw JSON payload plus its topic.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Value,
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish immediately.
    async fn publish(&self, topic: &str, payload: Value) -> DomainResult<()>;

    /// Publish after `delay`. MAY be approximated by sleeping in-process
    /// and then calling `publish`, per spec.md §4.2.
    async fn publish_delayed(&self, topic: &str, payload: Value, delay: Duration) -> DomainResult<()>;

    /// Subscribe to a topic; returns a channel of delivered messages.
    /// At-least-once: a consumer MUST treat handlers as idempotent.
    async fn consume(&self, topic: &str) -> DomainResult<tokio::sync::mpsc::Receiver<BrokerMessage>>;
}
