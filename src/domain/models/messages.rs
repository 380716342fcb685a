//! Actor mailbox message types.
//!
//! Each actor owns one `enum` of inbound messages, processed sequentially
//! off its `mpsc::Receiver`. Addresses are `mpsc::Sender<M>` clones; a
//! `oneshot::Sender` embedded in a message is the idiomatic "reply to"
//! channel where a caller needs a direct answer rather than an
//! asynchronous follow-up message.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::task_group::TaskGroupReply;

/// Address of a running Agent Actor (what gets registered in the
/// Reference Registry / persisted for NEED_INPUT resume).
pub type AgentAddress = mpsc::Sender<AgentMessage>;
pub type RouterAddress = mpsc::Sender<RouterMessage>;
pub type SessionAddress = mpsc::Sender<SessionMessage>;
pub type LeafAddress = mpsc::Sender<LeafMessage>;
pub type ExecutionAddress = mpsc::Sender<ExecutionMessage>;

/// A new or resumed unit of work arriving at an Agent/Leaf Actor.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_id: Uuid,
    pub trace_id: Uuid,
    pub task_path: String,
    pub tenant_id: String,
    pub capability: Option<String>,
    pub content: Value,
    pub input_params: Value,
    pub global_context: Value,
    /// Key-value pairs accumulated from prior siblings' results, passed
    /// along so a later step in a sequential group can see what earlier
    /// steps produced.
    pub enriched_context: Value,
    /// Seconds the execution actor waits for a connector response before
    /// reporting FAILED("timeout"). `None` falls back to the execution
    /// actor's default.
    pub default_timeout_secs: Option<i64>,
}

/// Final outcome of one task, reported by a child back up to whoever is
/// waiting on it (an Aggregator, or the Router for a root task).
#[derive(Debug, Clone)]
pub struct TaskCompleted {
    pub task_id: Uuid,
    pub task_path: String,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Messages the Router Actor accepts.
#[derive(Debug)]
pub enum RouterMessage {
    /// A new user-facing request: look up or create the Session for
    /// (tenant_id, node_id) and forward.
    UserRequest {
        tenant_id: String,
        node_id: String,
        request: TaskRequest,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    RegisterActor {
        tenant_id: String,
        node_id: String,
        address: SessionAddress,
        reply_to: oneshot::Sender<()>,
    },
    UnregisterActor {
        tenant_id: String,
        node_id: String,
    },
    RefreshTtl {
        tenant_id: String,
        node_id: String,
    },
    Heartbeat {
        tenant_id: String,
        node_id: String,
    },
}

/// Messages the Session Actor accepts.
#[derive(Debug)]
pub enum SessionMessage {
    Initialize {
        tenant_id: String,
        node_id: String,
        router: RouterAddress,
    },
    Forward {
        request: TaskRequest,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    Stop,
}

/// Messages the Agent Actor accepts.
#[derive(Debug)]
pub enum AgentMessage {
    NewTask {
        request: TaskRequest,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    ResumeTask {
        task_id: Uuid,
        tenant_id: String,
        input_params: Value,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    GroupResult(TaskGroupReply),
}

/// Messages the Leaf Actor accepts.
#[derive(Debug)]
pub enum LeafMessage {
    NewTask {
        request: TaskRequest,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    /// Re-run a previously NEED_INPUT task with the caller's answer. The
    /// Leaf Actor is the long-lived holder of the paused Execution Actor's
    /// address, keyed by `task_id`.
    Resume {
        task_id: Uuid,
        input_params: Value,
        reply_to: oneshot::Sender<TaskCompleted>,
    },
    ExecutionResult(ExecutionResult),
}

/// Outcome of an Execution Actor's capability dispatch.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub task_id: Uuid,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub missing_parameters: Option<Vec<String>>,
    pub question: Option<String>,
}

/// Messages the Execution Actor accepts.
#[derive(Debug)]
pub enum ExecutionMessage {
    Execute {
        request: TaskRequest,
        reply_to: LeafAddress,
    },
}
