//! Control Signal: an out-of-band cancel/pause/resume/modify directive
//! that running actors poll for between steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The directive a control signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Cancel,
    Pause,
    Resume,
}

impl SignalKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancel => "CANCEL",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CANCEL" => Some(Self::Cancel),
            "PAUSE" => Some(Self::Pause),
            "RESUME" => Some(Self::Resume),
            _ => None,
        }
    }
}

/// A recorded control signal, scoped either to a whole trace or to a
/// single task within it. Task-scoped signals take precedence over
/// trace-scoped ones when both are present for the same task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSignal {
    pub kind: SignalKind,
    pub trace_id: Uuid,
    pub task_id: Option<Uuid>,
    pub modify_payload: Option<Value>,
    pub issued_at: DateTime<Utc>,
}

impl ControlSignal {
    /// Registry key for a trace-scoped signal: `cmd:trace:{trace_id}`.
    #[must_use]
    pub fn trace_key(trace_id: Uuid) -> String {
        format!("cmd:trace:{trace_id}")
    }

    /// Registry key for a task-scoped signal: `cmd:task:{task_id}`.
    #[must_use]
    pub fn task_key(task_id: Uuid) -> String {
        format!("cmd:task:{task_id}")
    }
}
