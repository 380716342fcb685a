//! Scheduled Run: one concrete, time-stamped firing of a Task Definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::task_definition::ScheduleType;

/// Lifecycle status of a Scheduled Run.
///
/// Transition table (enforced by the store, not by callers):
/// `PENDING -> SCHEDULED -> DISPATCHED -> {SUCCESS, FAILED, CANCELLED}`.
/// `SCHEDULED -> PENDING` is the one reverse edge, taken when the scanner's
/// downstream publish fails and the record must be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Scheduled,
    Dispatched,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Scheduled => "SCHEDULED",
            Self::Dispatched => "DISPATCHED",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "SCHEDULED" => Some(Self::Scheduled),
            "DISPATCHED" => Some(Self::Dispatched),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal edge in the
    /// transition table.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Scheduled)
                | (Self::Scheduled, Self::Pending)
                | (Self::Scheduled, Self::Dispatched)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::Dispatched, Self::Success)
                | (Self::Dispatched, Self::Failed)
                | (Self::Dispatched, Self::Cancelled)
                | (Self::Pending, Self::Cancelled)
        )
    }
}

/// One concrete firing of a `TaskDefinition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledRun {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub tenant_id: String,

    pub trace_id: Uuid,
    /// Round index within a LOOP/INTERVAL_LOOP trace; 0 for everything else.
    pub round_index: u32,

    pub schedule_type: ScheduleType,
    pub status: RunStatus,
    pub scheduled_time: DateTime<Utc>,

    /// Schedule-type-specific bookkeeping: `delay_seconds`/`original_scheduled`
    /// for DELAYED, `expression`/`original_scheduled` for CRON,
    /// `max_rounds`/`loop_interval` for LOOP/INTERVAL_LOOP.
    pub schedule_config: Value,

    pub retry_count: u32,
    pub last_error: Option<String>,

    pub request_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledRun {
    #[must_use]
    pub fn new(definition_id: Uuid, tenant_id: impl Into<String>, trace_id: Uuid, schedule_type: ScheduleType, scheduled_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            definition_id,
            tenant_id: tenant_id.into(),
            trace_id,
            round_index: 0,
            schedule_type,
            status: RunStatus::Pending,
            scheduled_time,
            schedule_config: Value::Null,
            retry_count: 0,
            last_error: None,
            request_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compute the next exponential backoff delay given the configured
    /// bounds, per spec.md's retry policy.
    #[must_use]
    pub fn next_backoff_ms(&self, initial_backoff_ms: u64, max_backoff_ms: u64) -> u64 {
        let shift = self.retry_count.min(32);
        let scaled = initial_backoff_ms.saturating_mul(1u64 << shift);
        scaled.min(max_backoff_ms)
    }
}
