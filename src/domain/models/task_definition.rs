//! Task Definition: the reusable template a caller registers once and
//! triggers (directly, on a cron, or on a loop) many times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How a Task Definition's Scheduled Runs are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleType {
    /// Fire once, as soon as possible.
    Immediate,
    /// Fire once, after a fixed delay.
    Delayed,
    /// Fire repeatedly according to a cron expression.
    Cron,
    /// Fire a bounded number of rounds, one immediately then waiting for
    /// dispatcher-driven rescheduling between rounds.
    Loop,
    /// Like `Loop`, but rounds are spaced by a fixed interval rather than
    /// firing back-to-back.
    IntervalLoop,
}

impl ScheduleType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "IMMEDIATE",
            Self::Delayed => "DELAYED",
            Self::Cron => "CRON",
            Self::Loop => "LOOP",
            Self::IntervalLoop => "INTERVAL_LOOP",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IMMEDIATE" => Some(Self::Immediate),
            "DELAYED" => Some(Self::Delayed),
            "CRON" => Some(Self::Cron),
            "LOOP" => Some(Self::Loop),
            "INTERVAL_LOOP" => Some(Self::IntervalLoop),
            _ => None,
        }
    }

    /// Whether this schedule type reuses a single trace id across all of
    /// its fires, rather than minting a new one per fire.
    #[must_use]
    pub const fn shares_trace_across_rounds(self) -> bool {
        matches!(self, Self::Loop | Self::IntervalLoop)
    }
}

/// A registered, reusable definition of work to schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub tenant_id: String,

    pub schedule_type: ScheduleType,
    /// Cron expression (only meaningful when `schedule_type == Cron`).
    pub cron_expression: Option<String>,
    /// Delay before the single fire (only meaningful when `Delayed`).
    pub delay_secs: Option<i64>,
    /// Spacing between loop rounds (only meaningful when `IntervalLoop`).
    pub loop_interval_secs: Option<i64>,
    /// Upper bound on loop rounds (only meaningful when `Loop`/`IntervalLoop`).
    pub max_rounds: Option<u32>,

    /// Opaque payload handed to the Agent Actor as task content.
    pub content: Value,
    /// Capability/agent type this definition's tasks should be routed to.
    pub agent_type: Option<String>,
    /// Seconds a leaf actor waits for a connector response before
    /// reporting FAILED("timeout"). `None` falls back to the execution
    /// actor's default.
    pub default_timeout_secs: Option<i64>,

    /// Whether this definition was created ad-hoc and has no lasting
    /// registry value (informational only; no GC sweeper acts on this).
    pub is_temporary: bool,
    /// Whether this definition is eligible for scanner/cron-loop pickup.
    /// A manually-triggered-only definition is created with this `false`.
    pub is_active: bool,

    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, tenant_id: impl Into<String>, schedule_type: ScheduleType, content: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            tenant_id: tenant_id.into(),
            schedule_type,
            cron_expression: None,
            delay_secs: None,
            loop_interval_secs: None,
            max_rounds: None,
            content,
            agent_type: None,
            default_timeout_secs: None,
            is_temporary: false,
            is_active: true,
            last_triggered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_cron(mut self, expression: impl Into<String>) -> Self {
        self.cron_expression = Some(expression.into());
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay_secs: i64) -> Self {
        self.delay_secs = Some(delay_secs);
        self
    }

    #[must_use]
    pub const fn with_loop(mut self, max_rounds: u32, loop_interval_secs: Option<i64>) -> Self {
        self.max_rounds = Some(max_rounds);
        self.loop_interval_secs = loop_interval_secs;
        self
    }

    #[must_use]
    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }

    #[must_use]
    pub const fn with_default_timeout(mut self, default_timeout_secs: i64) -> Self {
        self.default_timeout_secs = Some(default_timeout_secs);
        self
    }

    #[must_use]
    pub const fn temporary(mut self) -> Self {
        self.is_temporary = true;
        self
    }

    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}
