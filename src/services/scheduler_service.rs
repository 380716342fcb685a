//! Scheduler Service (C4): turns a trigger call into a single PENDING
//! `ScheduledRun` row. Grounded on
//! `original_source/trigger copy/services/scheduler_service.py`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{ScheduleType, ScheduledRun};
use crate::domain::ports::ScheduleStore;

pub struct SchedulerService {
    store: Arc<dyn ScheduleStore>,
}

impl SchedulerService {
    #[must_use]
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// IMMEDIATE: fire as soon as the scanner next polls.
    pub async fn schedule_immediate(
        &self,
        definition_id: Uuid,
        tenant_id: &str,
        input_params: serde_json::Value,
        request_id: Option<String>,
    ) -> DomainResult<ScheduledRun> {
        let trace_id = Uuid::new_v4();
        let now = Utc::now();
        let mut run = ScheduledRun::new(definition_id, tenant_id, trace_id, ScheduleType::Immediate, now);
        run.schedule_config = json!({ "input_params": input_params });
        run.request_id = request_id.clone();
        self.store.create_run(&run).await?;
        if let Some(rid) = request_id {
            self.store.bind_request_id(&rid, trace_id).await?;
        }
        Ok(run)
    }

    /// DELAYED: fire `delay_secs` from now.
    pub async fn schedule_delayed(
        &self,
        definition_id: Uuid,
        tenant_id: &str,
        delay_secs: i64,
        input_params: serde_json::Value,
        request_id: Option<String>,
    ) -> DomainResult<ScheduledRun> {
        let trace_id = Uuid::new_v4();
        let now = Utc::now();
        let scheduled_time = now + chrono::Duration::seconds(delay_secs);
        let mut run = ScheduledRun::new(definition_id, tenant_id, trace_id, ScheduleType::Delayed, scheduled_time);
        run.schedule_config = json!({
            "delay_seconds": delay_secs,
            "original_scheduled": scheduled_time,
            "input_params": input_params,
        });
        run.request_id = request_id.clone();
        self.store.create_run(&run).await?;
        if let Some(rid) = request_id {
            self.store.bind_request_id(&rid, trace_id).await?;
        }
        Ok(run)
    }

    /// CRON: compute the next occurrence after `base_time` and schedule
    /// exactly one run for it (the scanner's cron-alignment loop takes it
    /// from there for subsequent fires).
    pub async fn schedule_cron(
        &self,
        definition_id: Uuid,
        tenant_id: &str,
        expression: &str,
        base_time: DateTime<Utc>,
        request_id: Option<String>,
    ) -> DomainResult<ScheduledRun> {
        let trace_id = Uuid::new_v4();
        let next_run = super::cron_util::next_occurrence(expression, base_time)
            .ok_or_else(|| crate::domain::error::DomainError::Validation(format!("invalid cron expression: {expression}")))?;

        let mut run = ScheduledRun::new(definition_id, tenant_id, trace_id, ScheduleType::Cron, next_run);
        run.schedule_config = json!({
            "expression": expression,
            "original_scheduled": base_time,
            "input_params": Value::Null,
        });
        run.request_id = request_id.clone();
        self.store.create_run(&run).await?;
        if let Some(rid) = request_id {
            self.store.bind_request_id(&rid, trace_id).await?;
        }
        Ok(run)
    }

    /// LOOP / INTERVAL_LOOP: schedule round 0 now, sharing one trace_id
    /// across every round the dispatcher later creates.
    pub async fn schedule_loop(
        &self,
        definition_id: Uuid,
        tenant_id: &str,
        max_rounds: u32,
        loop_interval_secs: Option<i64>,
        input_params: Value,
        request_id: Option<String>,
    ) -> DomainResult<ScheduledRun> {
        let trace_id = Uuid::new_v4();
        let now = Utc::now();
        let schedule_type = if loop_interval_secs.is_some() {
            ScheduleType::IntervalLoop
        } else {
            ScheduleType::Loop
        };

        let mut run = ScheduledRun::new(definition_id, tenant_id, trace_id, schedule_type, now);
        run.schedule_config = json!({
            "max_rounds": max_rounds,
            "loop_interval": loop_interval_secs,
            "input_params": input_params,
        });
        run.request_id = request_id.clone();
        self.store.create_run(&run).await?;
        if let Some(rid) = request_id {
            self.store.bind_request_id(&rid, trace_id).await?;
        }
        Ok(run)
    }

    /// Create the next round of a LOOP/INTERVAL_LOOP trace, reusing its
    /// trace_id per the fixed §9 rule.
    pub async fn trigger_loop_round(
        &self,
        definition_id: Uuid,
        tenant_id: &str,
        trace_id: Uuid,
        round_index: u32,
        max_rounds: u32,
        loop_interval_secs: Option<i64>,
        scheduled_time: DateTime<Utc>,
    ) -> DomainResult<ScheduledRun> {
        let schedule_type = if loop_interval_secs.is_some() {
            ScheduleType::IntervalLoop
        } else {
            ScheduleType::Loop
        };
        let mut run = ScheduledRun::new(definition_id, tenant_id, trace_id, schedule_type, scheduled_time);
        run.round_index = round_index;
        run.schedule_config = json!({
            "max_rounds": max_rounds,
            "loop_interval": loop_interval_secs,
        });
        self.store.create_run(&run).await?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteScheduleStore};
    use crate::domain::models::{ScheduleType, TaskDefinition};

    async fn scheduler_with_definition() -> (SchedulerService, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let store: Arc<dyn ScheduleStore> = Arc::new(SqliteScheduleStore::new(pool));
        let definition = TaskDefinition::new("loop-job", "acme", ScheduleType::Loop, json!({}));
        store.create_definition(&definition).await.unwrap();
        (SchedulerService::new(store), definition.id)
    }

    #[tokio::test]
    async fn schedule_loop_and_every_round_share_one_trace_id() {
        let (scheduler, definition_id) = scheduler_with_definition().await;
        let first = scheduler.schedule_loop(definition_id, "acme", 3, None, json!({}), None).await.unwrap();
        assert_eq!(first.round_index, 0);

        let second =
            scheduler.trigger_loop_round(definition_id, "acme", first.trace_id, 1, 3, None, Utc::now()).await.unwrap();
        assert_eq!(second.trace_id, first.trace_id);
        assert_eq!(second.round_index, 1);
    }

    #[tokio::test]
    async fn schedule_cron_rejects_invalid_expression() {
        let (scheduler, definition_id) = scheduler_with_definition().await;
        let result = scheduler.schedule_cron(definition_id, "acme", "not a cron expression", Utc::now(), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn schedule_immediate_binds_request_id_for_lookup() {
        let (scheduler, definition_id) = scheduler_with_definition().await;
        let run = scheduler
            .schedule_immediate(definition_id, "acme", json!({}), Some("req-1".to_string()))
            .await
            .unwrap();
        assert_eq!(run.request_id.as_deref(), Some("req-1"));
    }
}
