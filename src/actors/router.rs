//! Router Actor (C7): the single global entry point that locates or
//! spawns the Session Actor for a (tenant_id, node_id) pair and forwards
//! the request to it. Grounded on
//! `original_source/agents/router_actor.py`'s `RouterActor`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::models::{ActorReference, LeafMessage, RouterAddress, RouterMessage, SessionAddress, SessionMessage};
use crate::domain::ports::{ControlSignalStore, OperationClassifier, ReferenceRegistry, TaskPlanner};
use crate::services::{CapabilityRegistry, EventBus};

use super::agent::AgentActor;
use super::directory::AddressDirectory;
use super::session::SessionActor;

const MAILBOX_CAPACITY: usize = 256;

pub struct RouterActor {
    self_address: RouterAddress,
    registry: Arc<dyn ReferenceRegistry>,
    session_directory: Arc<AddressDirectory<SessionMessage>>,
    leaf_directory: Arc<AddressDirectory<LeafMessage>>,
    ttl_secs: i64,
    planner: Arc<dyn TaskPlanner>,
    classifier: Arc<dyn OperationClassifier>,
    capability_registry: Arc<CapabilityRegistry>,
    events: Arc<EventBus>,
    signals: Arc<dyn ControlSignalStore>,
}

impl RouterActor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        registry: Arc<dyn ReferenceRegistry>,
        ttl_secs: i64,
        planner: Arc<dyn TaskPlanner>,
        classifier: Arc<dyn OperationClassifier>,
        capability_registry: Arc<CapabilityRegistry>,
        events: Arc<EventBus>,
        signals: Arc<dyn ControlSignalStore>,
    ) -> RouterAddress {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self {
            self_address: tx.clone(),
            registry,
            session_directory: AddressDirectory::new(),
            leaf_directory: AddressDirectory::new(),
            ttl_secs,
            planner,
            classifier,
            capability_registry,
            events,
            signals,
        };
        tokio::spawn(actor.run(rx));
        tx
    }

    async fn run(self, mut mailbox: mpsc::Receiver<RouterMessage>) {
        let mut sessions: HashMap<(String, String), SessionAddress> = HashMap::new();

        while let Some(msg) = mailbox.recv().await {
            self.handle(msg, &mut sessions).await;
        }
    }

    async fn handle(&self, msg: RouterMessage, sessions: &mut HashMap<(String, String), SessionAddress>) {
        match msg {
            RouterMessage::UserRequest { tenant_id, node_id, request, reply_to } => {
                let key = (tenant_id.clone(), node_id.clone());
                let session = if let Some(existing) = sessions.get(&key) {
                    existing.clone()
                } else {
                    let agent = AgentActor::spawn(
                        Arc::clone(&self.classifier),
                        Arc::clone(&self.planner),
                        Arc::clone(&self.capability_registry),
                        Arc::clone(&self.registry),
                        Arc::clone(&self.leaf_directory),
                        self.ttl_secs,
                        Arc::clone(&self.events),
                        Arc::clone(&self.signals),
                        self.self_address.clone(),
                    );
                    let session = SessionActor::spawn(tenant_id.clone(), node_id.clone(), agent, self.self_address.clone());
                    sessions.insert(key, session.clone());
                    session
                };

                if session.send(SessionMessage::Forward { request, reply_to }).await.is_err() {
                    warn!(tenant_id, node_id, "session actor mailbox closed");
                }
            }
            RouterMessage::RegisterActor { tenant_id, node_id, address, reply_to } => {
                let handle = self.session_directory.register(address).await;
                let reference = ActorReference::new(tenant_id, node_id, handle, self.ttl_secs);
                if let Err(err) = self.registry.save(reference).await {
                    warn!(error = %err, "failed to persist actor reference");
                }
                let _ = reply_to.send(());
            }
            RouterMessage::UnregisterActor { tenant_id, node_id } => {
                if let Err(err) = self.registry.delete(&tenant_id, &node_id).await {
                    warn!(error = %err, "failed to delete actor reference");
                }
            }
            RouterMessage::RefreshTtl { tenant_id, node_id } => {
                match self.registry.refresh_ttl(&tenant_id, &node_id, self.ttl_secs).await {
                    Ok(true) => {}
                    Ok(false) => warn!(tenant_id, node_id, "refresh_ttl: no such registration"),
                    Err(err) => warn!(error = %err, "refresh_ttl failed"),
                }
            }
            RouterMessage::Heartbeat { tenant_id, node_id } => {
                match self.registry.update_heartbeat(&tenant_id, &node_id, self.ttl_secs).await {
                    Ok(true) => info!(tenant_id, node_id, "heartbeat recorded"),
                    Ok(false) => warn!(tenant_id, node_id, "heartbeat: no such registration"),
                    Err(err) => warn!(error = %err, "heartbeat failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    use crate::adapters::connectors::MockConnector;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteControlSignalStore, SqliteReferenceRegistry};
    use crate::domain::models::TaskRequest;
    use crate::domain::ports::{RuleBasedClassifier, SingleStepPlanner};

    async fn spawn_router() -> RouterAddress {
        let pool = create_migrated_test_pool().await.unwrap();
        let registry: Arc<dyn ReferenceRegistry> = Arc::new(SqliteReferenceRegistry::new(pool.clone()));
        let signals: Arc<dyn ControlSignalStore> = Arc::new(SqliteControlSignalStore::new(pool));
        let mut capabilities = CapabilityRegistry::new();
        capabilities.register("mock", Arc::new(MockConnector));
        RouterActor::spawn(
            registry,
            3600,
            Arc::new(SingleStepPlanner),
            Arc::new(RuleBasedClassifier),
            Arc::new(capabilities),
            Arc::new(EventBus::new()),
            signals,
        )
    }

    #[tokio::test]
    async fn user_request_routes_through_session_and_agent_to_success() {
        let router = spawn_router().await;
        let request = TaskRequest {
            task_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            task_path: "root".to_string(),
            tenant_id: "acme".to_string(),
            capability: Some("mock".to_string()),
            content: json!({}),
            input_params: json!({ "greeting": "hi" }),
            global_context: json!({}),
            enriched_context: json!({}),
            default_timeout_secs: None,
        };

        let (tx, rx) = oneshot::channel();
        router
            .send(RouterMessage::UserRequest { tenant_id: "acme".to_string(), node_id: "node-0".to_string(), request, reply_to: tx })
            .await
            .unwrap();
        let completed = rx.await.unwrap();
        assert_eq!(completed.status, "SUCCESS");
        assert_eq!(completed.result, Some(json!({ "greeting": "hi" })));
    }

    #[tokio::test]
    async fn repeated_requests_for_same_session_reuse_the_same_agent() {
        let router = spawn_router().await;
        let mut last_result = None;
        for _ in 0..2 {
            let request = TaskRequest {
                task_id: Uuid::new_v4(),
                trace_id: Uuid::new_v4(),
                task_path: "root".to_string(),
                tenant_id: "acme".to_string(),
                capability: Some("mock".to_string()),
                content: json!({}),
                input_params: json!({}),
                global_context: json!({}),
                enriched_context: json!({}),
                default_timeout_secs: None,
            };
            let (tx, rx) = oneshot::channel();
            router
                .send(RouterMessage::UserRequest { tenant_id: "acme".to_string(), node_id: "node-0".to_string(), request, reply_to: tx })
                .await
                .unwrap();
            last_result = Some(rx.await.unwrap());
        }
        assert_eq!(last_result.unwrap().status, "SUCCESS");
    }

    #[tokio::test]
    async fn cancel_operation_routed_through_agent_reports_cancelled() {
        let router = spawn_router().await;
        let request = TaskRequest {
            task_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            task_path: "root".to_string(),
            tenant_id: "acme".to_string(),
            capability: Some("mock".to_string()),
            content: json!({ "operation": "cancel" }),
            input_params: json!({}),
            global_context: json!({}),
            enriched_context: json!({}),
            default_timeout_secs: None,
        };
        let (tx, rx) = oneshot::channel();
        router
            .send(RouterMessage::UserRequest { tenant_id: "acme".to_string(), node_id: "node-1".to_string(), request, reply_to: tx })
            .await
            .unwrap();
        let completed = rx.await.unwrap();
        assert_eq!(completed.status, "FAILED");
        assert_eq!(completed.error.as_deref(), Some("cancelled"));
    }
}
