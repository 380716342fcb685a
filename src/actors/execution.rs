//! Execution Actor (C11): the leaf of the leaf, dispatches one task to a
//! capability connector and reports the outcome back to whoever spawned
//! it. Grounded on
//! `original_source/tasks/capability_actors/execution_actor.py`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::models::{ExecutionMessage, ExecutionResult, LeafMessage, SignalKind, TaskRequest};
use crate::domain::ports::ControlSignalStore;
use crate::services::CapabilityRegistry;

const MAILBOX_CAPACITY: usize = 16;

/// Fallback connector timeout when `TaskRequest::default_timeout_secs`
/// is unset.
const DEFAULT_CONNECTOR_TIMEOUT_SECS: u64 = 30;

pub struct ExecutionActor {
    registry: Arc<CapabilityRegistry>,
    signals: Arc<dyn ControlSignalStore>,
}

impl ExecutionActor {
    #[must_use]
    pub fn spawn(registry: Arc<CapabilityRegistry>, signals: Arc<dyn ControlSignalStore>) -> mpsc::Sender<ExecutionMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self { registry, signals };
        tokio::spawn(actor.run(rx));
        tx
    }

    async fn run(self, mut mailbox: mpsc::Receiver<ExecutionMessage>) {
        while let Some(msg) = mailbox.recv().await {
            match msg {
                ExecutionMessage::Execute { request, reply_to } => {
                    let result = self.execute(&request).await;
                    if reply_to.send(LeafMessage::ExecutionResult(result)).await.is_err() {
                        warn!("leaf actor mailbox closed before execution result could be delivered");
                    }
                }
            }
        }
    }

    async fn execute(&self, request: &TaskRequest) -> ExecutionResult {
        if let Ok(Some(signal)) = self.signals.get_effective(request.trace_id, Some(request.task_id)).await {
            if signal.kind == SignalKind::Cancel {
                return ExecutionResult {
                    task_id: request.task_id,
                    status: "FAILED".to_string(),
                    result: None,
                    error: Some("cancelled".to_string()),
                    missing_parameters: None,
                    question: None,
                };
            }
        }

        let Some(capability) = request.capability.as_deref() else {
            return ExecutionResult {
                task_id: request.task_id,
                status: "FAILED".to_string(),
                result: None,
                error: Some("No capability specified for task".to_string()),
                missing_parameters: None,
                question: None,
            };
        };

        let Some(connector) = self.registry.resolve(capability) else {
            return ExecutionResult {
                task_id: request.task_id,
                status: "FAILED".to_string(),
                result: None,
                error: Some(format!("Capability {capability} not supported")),
                missing_parameters: None,
                question: None,
            };
        };

        let running_config = json!({
            "content": request.content,
            "inputs": request.input_params,
            "global_context": request.global_context,
        });

        let timeout = Duration::from_secs(request.default_timeout_secs.and_then(|s| u64::try_from(s).ok()).unwrap_or(DEFAULT_CONNECTOR_TIMEOUT_SECS));

        match tokio::time::timeout(timeout, connector.execute(&running_config)).await {
            Ok(outcome) => outcome.into_execution_result(request.task_id),
            Err(_) => ExecutionResult {
                task_id: request.task_id,
                status: "FAILED".to_string(),
                result: None,
                error: Some("timeout".to_string()),
                missing_parameters: None,
                question: None,
            },
        }
    }
}
