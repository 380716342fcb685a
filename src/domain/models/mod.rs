//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod actor_reference;
pub mod config;
pub mod control_signal;
pub mod event;
pub mod messages;
pub mod scheduled_run;
pub mod task_definition;
pub mod task_group;
pub mod task_instance;

pub use actor_reference::ActorReference;
pub use config::{Config, DatabaseConfig, HttpConfig, RegistryConfig, RetryConfig, SchedulerConfig};
pub use control_signal::{ControlSignal, SignalKind};
pub use event::{Event, EventType, SequenceNumber};
pub use messages::{
    AgentAddress, AgentMessage, ExecutionAddress, ExecutionMessage, ExecutionResult, LeafAddress,
    LeafMessage, RouterAddress, RouterMessage, SessionAddress, SessionMessage, TaskCompleted,
    TaskRequest,
};
pub use scheduled_run::{RunStatus, ScheduledRun};
pub use task_definition::{ScheduleType, TaskDefinition};
pub use task_group::{
    AggregationStrategy, ChildOutcome, SubtaskKind, TaskGroupReply, TaskGroupRequest, TaskSpec,
};
pub use task_instance::{InstanceStatus, TaskInstance};
