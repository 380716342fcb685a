//! In-process Message Broker (C2): per-topic fan-out over
//! `tokio::sync::broadcast`, bridged to the port's per-consumer `mpsc`
//! shape. Bundled as the default adapter; a real deployment would swap
//! this for a durable broker without touching callers, per spec.md §4.2
//! non-goals.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::domain::error::DomainResult;
use crate::domain::ports::{BrokerMessage, MessageBroker};

const TOPIC_CAPACITY: usize = 256;
const CONSUMER_CAPACITY: usize = 64;

pub struct InMemoryMessageBroker {
    topics: Mutex<HashMap<String, broadcast::Sender<BrokerMessage>>>,
}

impl Default for InMemoryMessageBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageBroker {
    #[must_use]
    pub fn new() -> Self {
        Self { topics: Mutex::new(HashMap::new()) }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BrokerMessage> {
        let mut topics = self.topics.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageBroker {
    async fn publish(&self, topic: &str, payload: Value) -> DomainResult<()> {
        let sender = self.sender_for(topic);
        // No subscribers is not an error: at-least-once delivery only
        // applies to consumers that existed when the message was sent.
        let _ = sender.send(BrokerMessage { topic: topic.to_string(), payload });
        Ok(())
    }

    async fn publish_delayed(&self, topic: &str, payload: Value, delay: Duration) -> DomainResult<()> {
        let sender = self.sender_for(topic);
        let topic = topic.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(BrokerMessage { topic, payload });
        });
        Ok(())
    }

    async fn consume(&self, topic: &str) -> DomainResult<mpsc::Receiver<BrokerMessage>> {
        let mut broadcast_rx = self.sender_for(topic).subscribe();
        let (tx, rx) = mpsc::channel(CONSUMER_CAPACITY);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "message broker consumer lagged, dropped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_round_trips_payload() {
        let broker = InMemoryMessageBroker::new();
        let mut rx = broker.consume("task.scheduled").await.unwrap();

        broker.publish("task.scheduled", serde_json::json!({"run_id": "abc"})).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "task.scheduled");
        assert_eq!(msg.payload["run_id"], "abc");
    }

    #[tokio::test]
    async fn publish_delayed_arrives_after_delay() {
        let broker = InMemoryMessageBroker::new();
        let mut rx = broker.consume("task.status_update").await.unwrap();

        broker
            .publish_delayed("task.status_update", serde_json::json!({"status": "done"}), Duration::from_millis(20))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.payload["status"], "done");
    }

    #[tokio::test]
    async fn multiple_consumers_each_receive_published_message() {
        let broker = InMemoryMessageBroker::new();
        let mut rx_a = broker.consume("topic").await.unwrap();
        let mut rx_b = broker.consume("topic").await.unwrap();

        broker.publish("topic", serde_json::json!(1)).await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap().payload, serde_json::json!(1));
        assert_eq!(rx_b.recv().await.unwrap().payload, serde_json::json!(1));
    }
}
