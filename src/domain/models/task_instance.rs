//! Task Instance: one node in the execution tree spawned for a trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a single Task Instance (Agent/Leaf/Execution node), distinct
/// from `RunStatus` which tracks the trigger-side Scheduled Run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Pending,
    Running,
    NeedInput,
    Success,
    Failed,
    Cancelled,
}

impl InstanceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::NeedInput => "NEED_INPUT",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "NEED_INPUT" => Some(Self::NeedInput),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One node in a trace's execution tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: Uuid,
    pub trace_id: Uuid,
    pub tenant_id: String,
    /// Slash-delimited path identifying this node's position in the tree,
    /// e.g. `/agent-a/agent-b/`. Children append their own actor id.
    pub task_path: String,
    pub parent_id: Option<Uuid>,
    pub layer: u32,

    pub status: InstanceStatus,
    pub content: Value,
    pub result: Option<Value>,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskInstance {
    #[must_use]
    pub fn root(trace_id: Uuid, tenant_id: impl Into<String>, content: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trace_id,
            tenant_id: tenant_id.into(),
            task_path: "/".to_string(),
            parent_id: None,
            layer: 0,
            status: InstanceStatus::Pending,
            content,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn child(&self, actor_id: &str, content: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trace_id: self.trace_id,
            tenant_id: self.tenant_id.clone(),
            task_path: format!("{}{actor_id}/", self.task_path),
            parent_id: Some(self.id),
            layer: self.layer + 1,
            status: InstanceStatus::Pending,
            content,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
