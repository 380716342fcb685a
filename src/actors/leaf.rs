//! Leaf Actor (C11): owns one Execution Actor per task, and is the
//! long-lived address a NEED_INPUT task resumes through. Grounded on
//! `original_source/tasks/capability_actors/leaf_actor.py`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::{
    ActorReference, ExecutionAddress, ExecutionMessage, ExecutionResult, LeafMessage, TaskCompleted, TaskRequest,
};
use crate::domain::ports::{ControlSignalStore, ReferenceRegistry};

use super::directory::AddressDirectory;
use super::execution::ExecutionActor;

const MAILBOX_CAPACITY: usize = 64;
const RESUME_REGISTRY_PREFIX: &str = "execres";

struct Pending {
    execution_address: ExecutionAddress,
    request: TaskRequest,
    reply_to: Option<oneshot::Sender<TaskCompleted>>,
}

pub struct LeafActor {
    self_address: mpsc::Sender<LeafMessage>,
    capability_registry: Arc<crate::services::CapabilityRegistry>,
    reference_registry: Arc<dyn ReferenceRegistry>,
    directory: Arc<AddressDirectory<LeafMessage>>,
    ttl_secs: i64,
    signals: Arc<dyn ControlSignalStore>,
}

impl LeafActor {
    #[must_use]
    pub fn spawn(
        capability_registry: Arc<crate::services::CapabilityRegistry>,
        reference_registry: Arc<dyn ReferenceRegistry>,
        directory: Arc<AddressDirectory<LeafMessage>>,
        ttl_secs: i64,
        signals: Arc<dyn ControlSignalStore>,
    ) -> mpsc::Sender<LeafMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self {
            self_address: tx.clone(),
            capability_registry,
            reference_registry,
            directory,
            ttl_secs,
            signals,
        };
        tokio::spawn(actor.run(rx));
        tx
    }

    async fn run(self, mut mailbox: mpsc::Receiver<LeafMessage>) {
        let mut pending: HashMap<Uuid, Pending> = HashMap::new();

        while let Some(msg) = mailbox.recv().await {
            match msg {
                LeafMessage::NewTask { request, reply_to } => {
                    self.start(&mut pending, request, reply_to).await;
                }
                LeafMessage::Resume { task_id, input_params, reply_to } => {
                    self.resume(&mut pending, task_id, input_params, reply_to).await;
                }
                LeafMessage::ExecutionResult(result) => {
                    self.complete(&mut pending, result).await;
                }
            }
        }
    }

    async fn start(&self, pending: &mut HashMap<Uuid, Pending>, request: TaskRequest, reply_to: oneshot::Sender<TaskCompleted>) {
        let execution_address = ExecutionActor::spawn(Arc::clone(&self.capability_registry), Arc::clone(&self.signals));
        if execution_address
            .send(ExecutionMessage::Execute { request: request.clone(), reply_to: self.self_address.clone() })
            .await
            .is_err()
        {
            warn!("execution actor mailbox closed immediately after spawn");
        }
        pending.insert(request.task_id, Pending { execution_address, request, reply_to: Some(reply_to) });
    }

    async fn resume(&self, pending: &mut HashMap<Uuid, Pending>, task_id: Uuid, input_params: Value, reply_to: oneshot::Sender<TaskCompleted>) {
        let Some(entry) = pending.get_mut(&task_id) else {
            let _ = reply_to.send(TaskCompleted {
                task_id,
                task_path: String::new(),
                status: "FAILED".to_string(),
                result: None,
                error: Some("Cannot find the ExecutionActor for this task".to_string()),
            });
            return;
        };

        entry.request.input_params = input_params;
        entry.reply_to = Some(reply_to);
        if entry
            .execution_address
            .send(ExecutionMessage::Execute { request: entry.request.clone(), reply_to: self.self_address.clone() })
            .await
            .is_err()
        {
            warn!(%task_id, "execution actor mailbox closed on resume");
        }
    }

    async fn complete(&self, pending: &mut HashMap<Uuid, Pending>, result: ExecutionResult) {
        let Some(entry) = pending.get_mut(&result.task_id) else {
            warn!(task_id = %result.task_id, "execution result for unknown/expired task");
            return;
        };

        let task_path = entry.request.task_path.clone();
        let tenant_id = entry.request.tenant_id.clone();

        if result.status == "NEED_INPUT" {
            let handle = self.directory.register(self.self_address.clone()).await;
            let node_id = format!("{RESUME_REGISTRY_PREFIX}:{}", result.task_id);
            let reference = ActorReference::new(tenant_id, node_id, handle, self.ttl_secs);
            if let Err(err) = self.reference_registry.save(reference).await {
                warn!(error = %err, "failed to persist resume link for NEED_INPUT task");
            }

            if let Some(reply_to) = entry.reply_to.take() {
                let need_input = serde_json::json!({
                    "missing_parameters": result.missing_parameters,
                    "question": result.question,
                });
                let _ = reply_to.send(TaskCompleted {
                    task_id: result.task_id,
                    task_path,
                    status: "NEED_INPUT".to_string(),
                    result: Some(need_input),
                    error: None,
                });
            }
            return;
        }

        let status = result.status.clone();
        if let Some(reply_to) = entry.reply_to.take() {
            let _ = reply_to.send(TaskCompleted {
                task_id: result.task_id,
                task_path,
                status,
                result: result.result,
                error: result.error,
            });
        }
        pending.remove(&result.task_id);
    }
}
