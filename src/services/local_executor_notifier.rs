//! Bridges the Schedule Dispatcher (C6) to the actor hierarchy (C7-C11) for
//! a standalone, single-process deployment: `push_ready_for_execution`
//! submits the run's definition to the Router as a root task and, once it
//! settles, republishes the terminal status on `task.status_update` so the
//! dispatcher's own reschedule logic still runs. A deployment that farms
//! execution out to a separate process would swap this for an
//! `ExternalExecutorNotifier` that calls out over HTTP/queue instead.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::oneshot;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::{RouterAddress, RouterMessage, TaskInstance, TaskRequest};
use crate::domain::ports::{MessageBroker, ScheduleStore};

use super::schedule_dispatcher::ExternalExecutorNotifier;

pub struct LocalExecutorNotifier {
    router: RouterAddress,
    store: Arc<dyn ScheduleStore>,
    broker: Arc<dyn MessageBroker>,
    node_id: String,
}

impl LocalExecutorNotifier {
    #[must_use]
    pub fn new(router: RouterAddress, store: Arc<dyn ScheduleStore>, broker: Arc<dyn MessageBroker>, node_id: String) -> Self {
        Self { router, store, broker, node_id }
    }
}

#[async_trait::async_trait]
impl ExternalExecutorNotifier for LocalExecutorNotifier {
    async fn push_ready_for_execution(&self, run_id: Uuid, trace_id: Uuid) -> anyhow::Result<()> {
        let Some(run) = self.store.get_run(run_id).await? else {
            anyhow::bail!("scheduled run {run_id} not found");
        };
        let Some(definition) = self.store.get_definition(run.definition_id).await? else {
            anyhow::bail!("task definition {} not found", run.definition_id);
        };

        let instance = TaskInstance::root(trace_id, run.tenant_id.clone(), definition.content.clone());
        self.store.create_instance(&instance).await?;

        let global_context = json!({ "tenant_id": run.tenant_id, "run_id": run.id, "round_index": run.round_index });
        let capability = definition.content.get("capability").and_then(serde_json::Value::as_str).map(str::to_string);
        let input_params = run.schedule_config.get("input_params").cloned().unwrap_or(serde_json::Value::Null);
        let request = TaskRequest {
            task_id: instance.id,
            trace_id,
            task_path: instance.task_path.clone(),
            tenant_id: run.tenant_id.clone(),
            capability,
            content: definition.content.clone(),
            input_params,
            global_context,
            enriched_context: json!({}),
            default_timeout_secs: definition.default_timeout_secs,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.router
            .send(RouterMessage::UserRequest {
                tenant_id: run.tenant_id.clone(),
                node_id: self.node_id.clone(),
                request,
                reply_to: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("router actor mailbox closed"))?;

        let store = Arc::clone(&self.store);
        let broker = Arc::clone(&self.broker);
        tokio::spawn(async move {
            let Ok(completed) = reply_rx.await else {
                warn!(%run_id, "router dropped reply before task completed");
                return;
            };

            let mut instance = instance;
            instance.status = crate::domain::models::InstanceStatus::from_str(&completed.status).unwrap_or(crate::domain::models::InstanceStatus::Failed);
            instance.result = completed.result;
            instance.error = completed.error;
            if let Err(err) = store.update_instance(&instance).await {
                warn!(%run_id, error = %err, "failed to persist completed task instance");
            }

            if let Err(err) = broker.publish("task.status_update", json!({ "run_id": run_id, "status": completed.status })).await {
                warn!(%run_id, error = %err, "failed to publish task.status_update");
            }
        });

        Ok(())
    }
}
