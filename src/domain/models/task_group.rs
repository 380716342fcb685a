//! Task-Group Request/Reply: the fan-out contract between an Agent Actor
//! and the Task-Group Aggregator it spawns to run its plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How an aggregator runs the children in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Run children one at a time; abort on the first FAILED/NEED_INPUT.
    #[default]
    Sequential,
    /// Run all children concurrently; wait for all, report the first
    /// failure but include every child's detail.
    Parallel,
}

/// Which actor a planned step's task target dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubtaskKind {
    /// A deterministic tool/capability, run by a Leaf Actor.
    #[default]
    Mcp,
    /// Another Agent Actor, reached recursively through the Router under
    /// `agent_type` as the target node_id.
    Agent,
}

/// One planned unit of work within a task group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: Uuid,
    pub task_path: String,
    pub kind: SubtaskKind,
    pub capability: Option<String>,
    /// For `SubtaskKind::Agent` steps, the target node_id to route to
    /// through the Router; unused for `Mcp` steps.
    pub agent_type: Option<String>,
    pub content: Value,
    pub params: Value,
    pub default_timeout_secs: Option<i64>,
}

/// A request to run a group of planned tasks under one aggregation
/// strategy, sent from an Agent Actor to a freshly spawned Aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroupRequest {
    pub trace_id: Uuid,
    pub parent_task_id: Uuid,
    pub strategy: AggregationStrategy,
    pub tasks: Vec<TaskSpec>,
    pub global_context: Value,
    /// Accumulated key-value pairs written after each SUCCESSful child,
    /// keyed by the child's task_path, fed into subsequent children's
    /// `TaskRequest::enriched_context` under the Sequential strategy.
    pub enriched_context: Value,
}

/// Per-child outcome reported back inside a `TaskGroupReply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildOutcome {
    pub task_id: Uuid,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// The aggregator's final answer to the Agent Actor that spawned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroupReply {
    pub trace_id: Uuid,
    pub parent_task_id: Uuid,
    /// Overall status: SUCCESS, FAILED, or NEED_INPUT (the latter only
    /// ever originates from a single paused child; sequential strategy
    /// also aborts the remaining group in that case).
    pub status: String,
    pub children: Vec<ChildOutcome>,
    /// Present only when `status == "NEED_INPUT"`.
    pub need_input: Option<Value>,
}
