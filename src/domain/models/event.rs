//! Event: a fire-and-forget notification published on the Event Bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The closed set of event types the core ever publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TaskCreated,
    TaskCompleted,
    TaskFailed,
    TaskPaused,
    TaskResumed,
    TaskCancelled,
    CapabilityExecuted,
    CapabilityFailed,
    CapabilityError,
    ScheduleFired,
    SystemError,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskFailed => "TASK_FAILED",
            Self::TaskPaused => "TASK_PAUSED",
            Self::TaskResumed => "TASK_RESUMED",
            Self::TaskCancelled => "TASK_CANCELLED",
            Self::CapabilityExecuted => "CAPABILITY_EXECUTED",
            Self::CapabilityFailed => "CAPABILITY_FAILED",
            Self::CapabilityError => "CAPABILITY_ERROR",
            Self::ScheduleFired => "SCHEDULE_FIRED",
            Self::SystemError => "SYSTEM_ERROR",
        }
    }
}

/// A monotonically increasing per-process sequence number, used to give
/// subscribers a stable total order even across topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

/// A single published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub sequence: SequenceNumber,
    pub event_type: EventType,
    pub trace_id: Uuid,
    pub task_id: Option<Uuid>,
    pub task_path: Option<String>,
    pub source: String,
    pub data: Value,
    pub occurred_at: DateTime<Utc>,
}
