//! Port for the Control Signal Store (C13).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::ControlSignal;

#[async_trait]
pub trait ControlSignalStore: Send + Sync {
    async fn set(&self, signal: ControlSignal) -> DomainResult<()>;

    /// Looks up the effective signal for a task: task-scoped wins over
    /// trace-scoped when both are present.
    async fn get_effective(&self, trace_id: Uuid, task_id: Option<Uuid>) -> DomainResult<Option<ControlSignal>>;

    async fn clear_trace(&self, trace_id: Uuid) -> DomainResult<()>;
    async fn clear_task(&self, task_id: Uuid) -> DomainResult<()>;
}
