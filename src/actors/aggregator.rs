//! Task-Group Aggregator (C10): runs one Agent Actor's plan, either
//! sequentially (abort on first FAILED/NEED_INPUT) or in parallel (wait
//! for all, report the first failure with full per-child detail).
//! Grounded on `original_source/tasks/aggregator_actor.py`.
//!
//! Unlike Router/Session/Agent/Leaf, this isn't a long-lived mailbox actor:
//! it exists for the lifetime of one task group, so it's a plain async
//! function spawned per group rather than a `struct` with its own
//! `mpsc::Receiver`.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::domain::models::{
    AggregationStrategy, ChildOutcome, LeafMessage, RouterAddress, RouterMessage, SignalKind, SubtaskKind, TaskCompleted, TaskGroupReply,
    TaskGroupRequest, TaskRequest, TaskSpec,
};
use crate::domain::ports::{ControlSignalStore, ReferenceRegistry};

use super::directory::AddressDirectory;
use super::leaf::LeafActor;

pub struct AggregatorContext {
    pub capability_registry: Arc<crate::services::CapabilityRegistry>,
    pub reference_registry: Arc<dyn ReferenceRegistry>,
    pub leaf_directory: Arc<AddressDirectory<LeafMessage>>,
    pub registry_ttl_secs: i64,
    pub signals: Arc<dyn ControlSignalStore>,
    /// Router address this group's parent Agent Actor was spawned under,
    /// used to dispatch `SubtaskKind::Agent` children recursively.
    pub router: RouterAddress,
}

pub async fn run(request: TaskGroupRequest, ctx: Arc<AggregatorContext>, reply_to: oneshot::Sender<TaskGroupReply>) {
    let reply = match request.strategy {
        AggregationStrategy::Sequential => run_sequential(&request, &ctx).await,
        AggregationStrategy::Parallel => run_parallel(&request, &ctx).await,
    };
    if reply_to.send(reply).is_err() {
        warn!(parent_task_id = %request.parent_task_id, "agent actor mailbox closed before group result could be delivered");
    }
}

async fn run_child(spec: TaskSpec, request: &TaskGroupRequest, ctx: &AggregatorContext, enriched_context: &Value) -> ChildOutcome {
    if let Ok(Some(signal)) = ctx.signals.get_effective(request.trace_id, Some(spec.task_id)).await {
        if signal.kind == SignalKind::Cancel {
            return ChildOutcome { task_id: spec.task_id, status: "FAILED".to_string(), result: None, error: Some("cancelled".to_string()) };
        }
    }

    let task_request = TaskRequest {
        task_id: spec.task_id,
        trace_id: request.trace_id,
        task_path: spec.task_path.clone(),
        tenant_id: request_tenant_id(request),
        capability: spec.capability,
        content: spec.content,
        input_params: spec.params,
        global_context: request.global_context.clone(),
        enriched_context: enriched_context.clone(),
        default_timeout_secs: spec.default_timeout_secs,
    };

    match spec.kind {
        SubtaskKind::Mcp => run_child_leaf(spec.task_id, task_request, ctx).await,
        SubtaskKind::Agent => run_child_agent(spec.task_id, spec.agent_type, task_request, ctx).await,
    }
}

async fn run_child_leaf(task_id: uuid::Uuid, task_request: TaskRequest, ctx: &AggregatorContext) -> ChildOutcome {
    let leaf = LeafActor::spawn(
        Arc::clone(&ctx.capability_registry),
        Arc::clone(&ctx.reference_registry),
        Arc::clone(&ctx.leaf_directory),
        ctx.registry_ttl_secs,
        Arc::clone(&ctx.signals),
    );

    let (reply_tx, reply_rx) = oneshot::channel();
    if leaf.send(LeafMessage::NewTask { request: task_request, reply_to: reply_tx }).await.is_err() {
        return ChildOutcome { task_id, status: "FAILED".to_string(), result: None, error: Some("leaf actor mailbox closed before dispatch".to_string()) };
    }

    match reply_rx.await {
        Ok(TaskCompleted { task_id, status, result, error, .. }) => ChildOutcome { task_id, status, result, error },
        Err(_) => {
            ChildOutcome { task_id, status: "FAILED".to_string(), result: None, error: Some("leaf actor dropped without a result".to_string()) }
        }
    }
}

/// Dispatches a `SubtaskKind::Agent` child back through the Router,
/// recursively decomposing it as its own Agent Actor under `(tenant,
/// node=executor)`. `spec.agent_type` carries the target node_id.
async fn run_child_agent(task_id: uuid::Uuid, executor: Option<String>, task_request: TaskRequest, ctx: &AggregatorContext) -> ChildOutcome {
    let node_id = executor.unwrap_or_default();
    let (reply_tx, reply_rx) = oneshot::channel();
    let message = RouterMessage::UserRequest {
        tenant_id: task_request.tenant_id.clone(),
        node_id,
        request: task_request,
        reply_to: reply_tx,
    };
    if ctx.router.send(message).await.is_err() {
        return ChildOutcome { task_id, status: "FAILED".to_string(), result: None, error: Some("router mailbox closed before dispatch".to_string()) };
    }

    match reply_rx.await {
        Ok(TaskCompleted { task_id, status, result, error, .. }) => ChildOutcome { task_id, status, result, error },
        Err(_) => ChildOutcome { task_id, status: "FAILED".to_string(), result: None, error: Some("router dropped without a result".to_string()) },
    }
}

/// `TaskGroupRequest` doesn't carry a tenant_id directly (it's assembled
/// from the plan, not the original request), so Agent Actor stamps it
/// into the first task's path namespace; every child in one group shares
/// the same tenant.
fn request_tenant_id(request: &TaskGroupRequest) -> String {
    request
        .global_context
        .get("tenant_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Merges a succeeded child's result into the running enriched context,
/// keyed by the child's task_path, so it rides along in the next
/// sibling's `TaskRequest::enriched_context`.
fn merge_enriched_context(enriched_context: &mut Value, task_path: &str, result: Option<Value>) {
    if let Value::Object(map) = enriched_context {
        map.insert(task_path.to_string(), result.unwrap_or(Value::Null));
    }
}

async fn run_sequential(request: &TaskGroupRequest, ctx: &AggregatorContext) -> TaskGroupReply {
    let mut children = Vec::with_capacity(request.tasks.len());
    let mut enriched_context = request.enriched_context.clone();

    for spec in &request.tasks {
        let task_path = spec.task_path.clone();
        let outcome = run_child(spec.clone(), request, ctx, &enriched_context).await;
        let halted = outcome.status == "FAILED" || outcome.status == "NEED_INPUT";
        let need_input = (outcome.status == "NEED_INPUT").then(|| outcome.result.clone()).flatten();
        let status = outcome.status.clone();

        if outcome.status == "SUCCESS" {
            merge_enriched_context(&mut enriched_context, &task_path, outcome.result.clone());
        }
        children.push(outcome);

        if halted {
            return TaskGroupReply {
                trace_id: request.trace_id,
                parent_task_id: request.parent_task_id,
                status,
                children,
                need_input,
            };
        }
    }

    TaskGroupReply {
        trace_id: request.trace_id,
        parent_task_id: request.parent_task_id,
        status: "SUCCESS".to_string(),
        children,
        need_input: None,
    }
}

async fn run_parallel(request: &TaskGroupRequest, ctx: &AggregatorContext) -> TaskGroupReply {
    let children: Vec<ChildOutcome> =
        join_all(request.tasks.iter().cloned().map(|spec| run_child(spec, request, ctx, &request.enriched_context))).await;

    let need_input_child = children.iter().find(|c| c.status == "NEED_INPUT");
    let status = if let Some(child) = need_input_child {
        let _ = child;
        "NEED_INPUT"
    } else if children.iter().any(|c| c.status == "FAILED") {
        "FAILED"
    } else {
        "SUCCESS"
    };
    let need_input = need_input_child.and_then(|c| c.result.clone());

    TaskGroupReply {
        trace_id: request.trace_id,
        parent_task_id: request.parent_task_id,
        status: status.to_string(),
        children,
        need_input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteReferenceRegistry};
    use crate::domain::error::DomainResult;
    use crate::domain::models::ControlSignal;
    use crate::domain::ports::{Connector, ConnectorOutcome, ConnectorStatus};

    struct OutcomeConnector(ConnectorStatus);

    #[async_trait]
    impl Connector for OutcomeConnector {
        async fn execute(&self, _running_config: &Value) -> ConnectorOutcome {
            ConnectorOutcome {
                status: self.0.clone(),
                result: Some(json!({ "ok": true })),
                error: matches!(self.0, ConnectorStatus::Failure).then(|| "boom".to_string()),
                missing_parameters: None,
                question: None,
            }
        }
    }

    /// Reports a fixed signal for every lookup, or none at all.
    struct FixedSignalStore(Option<ControlSignal>);

    #[async_trait]
    impl ControlSignalStore for FixedSignalStore {
        async fn set(&self, _signal: ControlSignal) -> DomainResult<()> {
            Ok(())
        }
        async fn get_effective(&self, _trace_id: Uuid, _task_id: Option<Uuid>) -> DomainResult<Option<ControlSignal>> {
            Ok(self.0.clone())
        }
        async fn clear_trace(&self, _trace_id: Uuid) -> DomainResult<()> {
            Ok(())
        }
        async fn clear_task(&self, _task_id: Uuid) -> DomainResult<()> {
            Ok(())
        }
    }

    /// A Router mailbox with no actor behind it; `run_child_agent` isn't
    /// exercised by these tests, so the receiver just needs to stay alive.
    fn dummy_router() -> RouterAddress {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        std::mem::forget(rx);
        tx
    }

    async fn context(steps: &[(&str, ConnectorStatus)]) -> Arc<AggregatorContext> {
        context_with_signal(steps, None).await
    }

    async fn context_with_signal(steps: &[(&str, ConnectorStatus)], signal: Option<ControlSignal>) -> Arc<AggregatorContext> {
        let pool = create_migrated_test_pool().await.unwrap();
        let reference_registry: Arc<dyn ReferenceRegistry> = Arc::new(SqliteReferenceRegistry::new(pool));
        let mut capabilities = crate::services::CapabilityRegistry::new();
        for (capability, status) in steps {
            capabilities.register(capability.to_string(), Arc::new(OutcomeConnector(status.clone())));
        }
        Arc::new(AggregatorContext {
            capability_registry: Arc::new(capabilities),
            reference_registry,
            leaf_directory: AddressDirectory::new(),
            registry_ttl_secs: 3600,
            signals: Arc::new(FixedSignalStore(signal)),
            router: dummy_router(),
        })
    }

    fn spec(capability: &str) -> TaskSpec {
        TaskSpec {
            task_id: Uuid::new_v4(),
            task_path: format!("root.{capability}"),
            kind: SubtaskKind::Mcp,
            capability: Some(capability.to_string()),
            agent_type: None,
            content: json!({}),
            params: Value::Null,
            default_timeout_secs: None,
        }
    }

    fn group_request(strategy: AggregationStrategy, tasks: Vec<TaskSpec>) -> TaskGroupRequest {
        TaskGroupRequest {
            trace_id: Uuid::new_v4(),
            parent_task_id: Uuid::new_v4(),
            strategy,
            tasks,
            global_context: json!({ "tenant_id": "acme" }),
            enriched_context: json!({}),
        }
    }

    #[tokio::test]
    async fn sequential_halts_at_first_failure() {
        let steps = [("first", ConnectorStatus::Success), ("second", ConnectorStatus::Failure), ("third", ConnectorStatus::Success)];
        let ctx = context(&steps).await;
        let request = group_request(AggregationStrategy::Sequential, vec![spec("first"), spec("second"), spec("third")]);

        let reply = run_sequential(&request, &ctx).await;
        assert_eq!(reply.status, "FAILED");
        assert_eq!(reply.children.len(), 2, "third step must not run after second fails");
    }

    #[tokio::test]
    async fn sequential_enriches_context_from_prior_successes() {
        let steps = [("first", ConnectorStatus::Success), ("second", ConnectorStatus::Success)];
        let ctx = context(&steps).await;
        let request = group_request(AggregationStrategy::Sequential, vec![spec("first"), spec("second")]);

        let reply = run_sequential(&request, &ctx).await;
        assert_eq!(reply.status, "SUCCESS");
        assert_eq!(reply.children[0].status, "SUCCESS");
        assert_eq!(reply.children[1].status, "SUCCESS");
    }

    #[tokio::test]
    async fn cancelled_child_short_circuits_before_dispatch() {
        let steps = [("first", ConnectorStatus::Success), ("second", ConnectorStatus::Success)];
        let signal = ControlSignal { kind: SignalKind::Cancel, trace_id: Uuid::new_v4(), task_id: None, modify_payload: None, issued_at: chrono::Utc::now() };
        let ctx = context_with_signal(&steps, Some(signal)).await;
        let request = group_request(AggregationStrategy::Sequential, vec![spec("first"), spec("second")]);

        let reply = run_sequential(&request, &ctx).await;
        assert_eq!(reply.status, "FAILED");
        assert_eq!(reply.children[0].error.as_deref(), Some("cancelled"));
        assert_eq!(reply.children.len(), 1, "cancelled group must halt at the first child");
    }

    #[tokio::test]
    async fn parallel_runs_all_children_and_reports_need_input_over_failure() {
        let steps = [("a", ConnectorStatus::Success), ("b", ConnectorStatus::NeedInput), ("c", ConnectorStatus::Failure)];
        let ctx = context(&steps).await;
        let request = group_request(AggregationStrategy::Parallel, vec![spec("a"), spec("b"), spec("c")]);

        let reply = run_parallel(&request, &ctx).await;
        assert_eq!(reply.children.len(), 3, "parallel strategy must wait for every child");
        assert_eq!(reply.status, "NEED_INPUT");
    }

    #[tokio::test]
    async fn parallel_reports_failure_when_no_child_needs_input() {
        let steps = [("a", ConnectorStatus::Success), ("b", ConnectorStatus::Failure)];
        let ctx = context(&steps).await;
        let request = group_request(AggregationStrategy::Parallel, vec![spec("a"), spec("b")]);

        let reply = run_parallel(&request, &ctx).await;
        assert_eq!(reply.status, "FAILED");
    }
}
