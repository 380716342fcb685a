//! Agent Actor (C9): classifies and plans one incoming task, spawns a
//! Task-Group Aggregator to run the plan, and resumes a paused task by
//! locating its Leaf Actor through the Reference Registry. Grounded on
//! `original_source/tasks/agents/agent_actor.py`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::{
    AgentAddress, AgentMessage, ControlSignal, EventType, LeafMessage, RouterAddress, SignalKind, TaskCompleted, TaskGroupReply,
    TaskGroupRequest, TaskRequest,
};
use crate::domain::ports::{ControlSignalStore, OperationClassifier, ReferenceRegistry, TaskOperation, TaskPlanner};
use crate::services::{CapabilityRegistry, EventBus};

use super::aggregator::{self, AggregatorContext};
use super::directory::AddressDirectory;

const MAILBOX_CAPACITY: usize = 64;
const RESUME_REGISTRY_PREFIX: &str = "execres";

struct PendingRoot {
    reply_to: oneshot::Sender<TaskCompleted>,
    task_path: String,
}

pub struct AgentActor {
    self_address: AgentAddress,
    classifier: Arc<dyn OperationClassifier>,
    planner: Arc<dyn TaskPlanner>,
    capability_registry: Arc<CapabilityRegistry>,
    reference_registry: Arc<dyn ReferenceRegistry>,
    leaf_directory: Arc<AddressDirectory<LeafMessage>>,
    registry_ttl_secs: i64,
    events: Arc<EventBus>,
    signals: Arc<dyn ControlSignalStore>,
    router: RouterAddress,
}

impl AgentActor {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        classifier: Arc<dyn OperationClassifier>,
        planner: Arc<dyn TaskPlanner>,
        capability_registry: Arc<CapabilityRegistry>,
        reference_registry: Arc<dyn ReferenceRegistry>,
        leaf_directory: Arc<AddressDirectory<LeafMessage>>,
        registry_ttl_secs: i64,
        events: Arc<EventBus>,
        signals: Arc<dyn ControlSignalStore>,
        router: RouterAddress,
    ) -> AgentAddress {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self {
            self_address: tx.clone(),
            classifier,
            planner,
            capability_registry,
            reference_registry,
            leaf_directory,
            registry_ttl_secs,
            events,
            signals,
            router,
        };
        tokio::spawn(actor.run(rx));
        tx
    }

    async fn run(self, mut mailbox: mpsc::Receiver<AgentMessage>) {
        let mut pending: HashMap<Uuid, PendingRoot> = HashMap::new();
        let ctx = Arc::new(AggregatorContext {
            capability_registry: Arc::clone(&self.capability_registry),
            reference_registry: Arc::clone(&self.reference_registry),
            leaf_directory: Arc::clone(&self.leaf_directory),
            registry_ttl_secs: self.registry_ttl_secs,
            signals: Arc::clone(&self.signals),
            router: self.router.clone(),
        });

        while let Some(msg) = mailbox.recv().await {
            match msg {
                AgentMessage::NewTask { request, reply_to } => {
                    self.start_new_task(&mut pending, request, reply_to, Arc::clone(&ctx)).await;
                }
                AgentMessage::ResumeTask { task_id, tenant_id, input_params, reply_to } => {
                    self.resume_task(task_id, tenant_id, input_params, reply_to).await;
                }
                AgentMessage::GroupResult(reply) => {
                    self.finish_task(&mut pending, reply);
                }
            }
        }
    }

    async fn start_new_task(
        &self,
        pending: &mut HashMap<Uuid, PendingRoot>,
        request: TaskRequest,
        reply_to: oneshot::Sender<TaskCompleted>,
        ctx: Arc<AggregatorContext>,
    ) {
        let classification = self.classifier.classify(&request.content).await;

        match classification.operation {
            TaskOperation::ResumeTask => {
                self.resume_task(request.task_id, request.tenant_id.clone(), request.input_params.clone(), reply_to).await;
                return;
            }
            TaskOperation::CancelTask => {
                self.cancel_task(request, reply_to).await;
                return;
            }
            // LOOP_TASK round scheduling is owned by the scheduler (C4-C6); by
            // the time an Agent Actor sees a task it runs the same as a fresh
            // one. NEW_TASK and EXECUTE_TASK fall through identically too.
            TaskOperation::NewTask | TaskOperation::ExecuteTask | TaskOperation::LoopTask => {}
        }

        let plan = self.planner.plan(&request).await;

        let mut global_context = request.global_context.clone();
        if let Value::Object(ref mut map) = global_context {
            map.insert("tenant_id".to_string(), Value::String(request.tenant_id.clone()));
        }

        let group_request = TaskGroupRequest {
            trace_id: request.trace_id,
            parent_task_id: request.task_id,
            strategy: plan.strategy,
            tasks: plan.steps,
            global_context,
            enriched_context: request.enriched_context.clone(),
        };

        self.events.publish(
            EventType::TaskCreated,
            request.trace_id,
            Some(request.task_id),
            Some(request.task_path.clone()),
            "agent_actor",
            json!({ "classification_confidence": classification.confidence }),
        );

        pending.insert(request.task_id, PendingRoot { reply_to, task_path: request.task_path.clone() });

        let self_address = self.self_address.clone();
        tokio::spawn(async move {
            let (group_reply_tx, group_reply_rx) = oneshot::channel();
            aggregator::run(group_request, ctx, group_reply_tx).await;
            if let Ok(reply) = group_reply_rx.await {
                if self_address.send(AgentMessage::GroupResult(reply)).await.is_err() {
                    warn!("agent actor mailbox closed before group result could be delivered");
                }
            }
        });
    }

    /// Records a trace-scoped CANCEL signal and replies immediately; any
    /// in-flight children pick it up at their next boundary check.
    async fn cancel_task(&self, request: TaskRequest, reply_to: oneshot::Sender<TaskCompleted>) {
        let signal = ControlSignal { kind: SignalKind::Cancel, trace_id: request.trace_id, task_id: None, modify_payload: None, issued_at: Utc::now() };
        if let Err(err) = self.signals.set(signal).await {
            warn!(error = %err, trace_id = %request.trace_id, "failed to record cancel signal");
        }

        self.events.publish(
            EventType::TaskCancelled,
            request.trace_id,
            Some(request.task_id),
            Some(request.task_path.clone()),
            "agent_actor",
            json!({}),
        );

        let _ = reply_to.send(TaskCompleted {
            task_id: request.task_id,
            task_path: request.task_path,
            status: "FAILED".to_string(),
            result: None,
            error: Some("cancelled".to_string()),
        });
    }

    fn finish_task(&self, pending: &mut HashMap<Uuid, PendingRoot>, reply: TaskGroupReply) {
        let Some(root) = pending.remove(&reply.parent_task_id) else {
            warn!(task_id = %reply.parent_task_id, "group result for unknown/expired root task");
            return;
        };

        let result = match reply.children.as_slice() {
            [single] => single.result.clone(),
            children => Some(json!({ "children": children })),
        };
        let error = reply.children.iter().find(|c| c.status == "FAILED").and_then(|c| c.error.clone());

        let event_type = match reply.status.as_str() {
            "SUCCESS" => EventType::TaskCompleted,
            "NEED_INPUT" => EventType::TaskPaused,
            _ => EventType::TaskFailed,
        };
        self.events.publish(
            event_type,
            reply.trace_id,
            Some(reply.parent_task_id),
            Some(root.task_path.clone()),
            "agent_actor",
            json!({ "status": reply.status }),
        );

        let _ = root.reply_to.send(TaskCompleted {
            task_id: reply.parent_task_id,
            task_path: root.task_path,
            status: reply.status,
            result: reply.need_input.or(result),
            error,
        });
    }

    async fn resume_task(&self, task_id: Uuid, tenant_id: String, input_params: Value, reply_to: oneshot::Sender<TaskCompleted>) {
        let node_id = format!("{RESUME_REGISTRY_PREFIX}:{task_id}");
        let reference = match self.reference_registry.get(&tenant_id, &node_id).await {
            Ok(Some(reference)) => reference,
            Ok(None) => {
                let _ = reply_to.send(Self::no_leaf_found(task_id));
                return;
            }
            Err(err) => {
                warn!(error = %err, %task_id, "reference registry lookup failed during resume");
                let _ = reply_to.send(Self::no_leaf_found(task_id));
                return;
            }
        };

        let Some(leaf) = self.leaf_directory.resolve(reference.address_handle).await else {
            let _ = reply_to.send(Self::no_leaf_found(task_id));
            return;
        };

        if leaf.send(LeafMessage::Resume { task_id, input_params, reply_to }).await.is_err() {
            warn!(%task_id, "leaf actor mailbox closed on resume");
        }
    }

    fn no_leaf_found(task_id: Uuid) -> TaskCompleted {
        TaskCompleted {
            task_id,
            task_path: String::new(),
            status: "FAILED".to_string(),
            result: None,
            error: Some("Cannot find the ExecutionActor for this task".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::adapters::sqlite::{SqliteControlSignalStore, SqliteReferenceRegistry};
    use crate::domain::ports::{RuleBasedClassifier, SingleStepPlanner};

    async fn spawn_agent() -> AgentAddress {
        let pool = create_migrated_test_pool().await.unwrap();
        let reference_registry: Arc<dyn ReferenceRegistry> = Arc::new(SqliteReferenceRegistry::new(pool.clone()));
        let signals: Arc<dyn ControlSignalStore> = Arc::new(SqliteControlSignalStore::new(pool));
        let capabilities = crate::services::CapabilityRegistry::new();
        let (router, router_rx) = mpsc::channel(1);
        std::mem::forget(router_rx);
        AgentActor::spawn(
            Arc::new(RuleBasedClassifier),
            Arc::new(SingleStepPlanner),
            Arc::new(capabilities),
            reference_registry,
            AddressDirectory::new(),
            3600,
            Arc::new(EventBus::new()),
            signals,
            router,
        )
    }

    fn request(capability: &str) -> TaskRequest {
        TaskRequest {
            task_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            task_path: "root".to_string(),
            tenant_id: "acme".to_string(),
            capability: Some(capability.to_string()),
            content: json!({}),
            input_params: Value::Null,
            global_context: json!({ "tenant_id": "acme" }),
            enriched_context: json!({}),
            default_timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn resume_of_unknown_task_reports_missing_executor() {
        let agent = spawn_agent().await;
        let (tx, rx) = oneshot::channel();
        agent
            .send(AgentMessage::ResumeTask { task_id: Uuid::new_v4(), tenant_id: "acme".to_string(), input_params: Value::Null, reply_to: tx })
            .await
            .unwrap();
        let completed = rx.await.unwrap();
        assert_eq!(completed.status, "FAILED");
        assert_eq!(completed.error.as_deref(), Some("Cannot find the ExecutionActor for this task"));
    }

    #[tokio::test]
    async fn unknown_capability_fails_without_need_input() {
        let agent = spawn_agent().await;
        let (tx, rx) = oneshot::channel();
        agent.send(AgentMessage::NewTask { request: request("no-such-capability"), reply_to: tx }).await.unwrap();
        let completed = rx.await.unwrap();
        assert_eq!(completed.status, "FAILED");
        assert_eq!(completed.error.as_deref(), Some("Capability no-such-capability not supported"));
    }

    #[tokio::test]
    async fn cancel_operation_short_circuits_without_planning() {
        let agent = spawn_agent().await;
        let (tx, rx) = oneshot::channel();
        let mut cancel_request = request("no-such-capability");
        cancel_request.content = json!({ "operation": "cancel" });
        agent.send(AgentMessage::NewTask { request: cancel_request, reply_to: tx }).await.unwrap();
        let completed = rx.await.unwrap();
        assert_eq!(completed.status, "FAILED");
        assert_eq!(completed.error.as_deref(), Some("cancelled"));
    }
}
