//! Schedule Scanner (C5): polls for due `ScheduledRun`s and publishes
//! them to `task.scheduled`; plus a separate cron-alignment loop that
//! drives CRON-type Task Definitions once per wall-clock minute.
//!
//! Grounded on `original_source/trigger/drivers/schedulers/cron_generator.py`'s
//! module-level `cron_scheduler` loop and the scanner wiring in
//! `original_source/trigger/main.py`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::models::{EventType, RunStatus, TaskDefinition};
use crate::domain::ports::{MessageBroker, ScheduleStore};

use super::cron_util;
use super::event_bus::EventBus;
use super::scheduler_service::SchedulerService;

pub struct ScheduleScanner {
    store: Arc<dyn ScheduleStore>,
    broker: Arc<dyn MessageBroker>,
    events: Arc<EventBus>,
    scan_interval: StdDuration,
}

impl ScheduleScanner {
    #[must_use]
    pub fn new(store: Arc<dyn ScheduleStore>, broker: Arc<dyn MessageBroker>, events: Arc<EventBus>, scan_interval: StdDuration) -> Self {
        Self { store, broker, events, scan_interval }
    }

    /// Poll-forever loop: every `scan_interval`, move due PENDING runs to
    /// SCHEDULED and publish them. On publish failure, revert to PENDING
    /// so the next tick retries.
    pub async fn run_forever(&self) {
        loop {
            if let Err(err) = self.scan_once().await {
                error!(error = %err, "schedule scanner tick failed");
            }
            tokio::time::sleep(self.scan_interval).await;
        }
    }

    async fn scan_once(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let due = self.store.get_pending(now).await?;
        for run in due {
            let moved = self
                .store
                .transition_run_status(run.id, RunStatus::Pending, RunStatus::Scheduled)
                .await?;
            if !moved {
                continue;
            }

            let payload = json!({
                "run_id": run.id,
                "definition_id": run.definition_id,
                "trace_id": run.trace_id,
                "round_index": run.round_index,
                "schedule_type": run.schedule_type.as_str(),
            });

            match self.broker.publish("task.scheduled", payload).await {
                Ok(()) => {
                    self.events.publish(
                        EventType::ScheduleFired,
                        run.trace_id,
                        None,
                        None,
                        "schedule_scanner",
                        json!({ "run_id": run.id }),
                    );
                }
                Err(err) => {
                    warn!(run_id = %run.id, error = %err, "publish failed, reverting run to PENDING");
                    let _ = self
                        .store
                        .transition_run_status(run.id, RunStatus::Scheduled, RunStatus::Pending)
                        .await;
                }
            }
        }
        Ok(())
    }
}

/// Drives CRON-type Task Definitions on an exact wall-clock-minute
/// cadence, independent of the general scanner's polling interval.
pub struct CronAlignmentLoop {
    store: Arc<dyn ScheduleStore>,
    scheduler: Arc<SchedulerService>,
    backfill_window_days: i64,
}

impl CronAlignmentLoop {
    #[must_use]
    pub fn new(store: Arc<dyn ScheduleStore>, scheduler: Arc<SchedulerService>, backfill_window_days: i64) -> Self {
        Self { store, scheduler, backfill_window_days }
    }

    pub async fn run_forever(&self) {
        loop {
            let now = Utc::now();
            if let Err(err) = self.tick(now).await {
                error!(error = %err, "cron alignment tick failed");
            }
            tokio::time::sleep(Self::duration_until_next_minute(now)).await;
        }
    }

    fn minute_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
        now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now)
    }

    fn duration_until_next_minute(now: DateTime<Utc>) -> StdDuration {
        let next_minute = Self::minute_boundary(now) + Duration::minutes(1);
        next_minute.signed_duration_since(now).to_std().unwrap_or(StdDuration::from_secs(1))
    }

    /// One aligned tick: for every active CRON definition, fire at most
    /// one run for the current wall-clock minute.
    async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let minute_boundary = Self::minute_boundary(now);

        for definition in self.store.list_active_cron_definitions().await? {
            self.maybe_fire(&definition, minute_boundary).await?;
        }
        Ok(())
    }

    async fn maybe_fire(&self, definition: &TaskDefinition, minute_boundary: DateTime<Utc>) -> anyhow::Result<()> {
        let Some(expression) = &definition.cron_expression else {
            return Ok(());
        };

        let base_time = definition
            .last_triggered_at
            .unwrap_or_else(|| minute_boundary - Duration::days(self.backfill_window_days));

        let Some(next_run) = cron_util::next_occurrence(expression, base_time) else {
            warn!(definition_id = %definition.id, expression, "invalid cron expression, skipping");
            return Ok(());
        };

        if minute_boundary < next_run {
            return Ok(());
        }

        // Mark fired before scheduling: bounds this definition to at
        // most one fire per wall-clock minute even if scheduling fails.
        self.store.update_last_triggered_at(definition.id, minute_boundary).await?;

        self.scheduler
            .schedule_cron(definition.id, &definition.tenant_id, expression, base_time, None)
            .await?;

        info!(definition_id = %definition.id, minute = %minute_boundary, "cron definition fired");
        Ok(())
    }
}
