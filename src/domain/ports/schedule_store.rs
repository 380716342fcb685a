//! Port for the Schedule Store (C3): persistence for Task Definitions,
//! Scheduled Runs, and Task Instances, plus the request_id -> trace_id
//! binding used by the HTTP API's lookup endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{RunStatus, ScheduledRun, TaskDefinition, TaskInstance};

/// Optional filters for listing scheduled runs.
#[derive(Debug, Default)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub definition_id: Option<Uuid>,
    pub trace_id: Option<Uuid>,
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    // -- Task Definitions --
    async fn create_definition(&self, definition: &TaskDefinition) -> DomainResult<()>;
    async fn get_definition(&self, id: Uuid) -> DomainResult<Option<TaskDefinition>>;
    async fn list_definitions(&self, tenant_id: &str) -> DomainResult<Vec<TaskDefinition>>;
    /// Every active CRON-type definition across all tenants, for the
    /// cron-alignment loop.
    async fn list_active_cron_definitions(&self) -> DomainResult<Vec<TaskDefinition>>;
    async fn update_last_triggered_at(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    // -- Scheduled Runs --
    async fn create_run(&self, run: &ScheduledRun) -> DomainResult<()>;
    async fn get_run(&self, id: Uuid) -> DomainResult<Option<ScheduledRun>>;
    async fn list_runs(&self, filter: RunFilter) -> DomainResult<Vec<ScheduledRun>>;

    /// Every run due at or before `now` with status PENDING.
    async fn get_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<ScheduledRun>>;

    /// Guarded compare-and-swap status transition; returns `Ok(false)` if
    /// the run's current status no longer matches `expected` (another
    /// worker already moved it, or it raced).
    async fn transition_run_status(
        &self,
        id: Uuid,
        expected: RunStatus,
        next: RunStatus,
    ) -> DomainResult<bool>;

    async fn record_retry(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> DomainResult<()>;

    // -- Task Instances --
    async fn create_instance(&self, instance: &TaskInstance) -> DomainResult<()>;
    async fn get_instance(&self, id: Uuid) -> DomainResult<Option<TaskInstance>>;
    async fn update_instance(&self, instance: &TaskInstance) -> DomainResult<()>;
    async fn list_instances_by_trace(&self, trace_id: Uuid) -> DomainResult<Vec<TaskInstance>>;

    // -- request_id -> trace_id binding --
    async fn bind_request_id(&self, request_id: &str, trace_id: Uuid) -> DomainResult<()>;
    async fn get_trace_by_request_id(&self, request_id: &str) -> DomainResult<Option<Uuid>>;
}
