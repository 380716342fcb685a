//! Schedule Dispatcher (C6): consumes `task.scheduled` and
//! `task.status_update`, notifies the external executor, and reschedules
//! CRON/LOOP definitions on terminal completion. Grounded on
//! `original_source/trigger copy/drivers/schedulers/schedule_dispatcher.py`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::domain::models::{EventType, RunStatus, ScheduleType};
use crate::domain::ports::{BrokerMessage, MessageBroker, ScheduleStore};

use super::event_bus::EventBus;
use super::scheduler_service::SchedulerService;

/// Notifies something outside this process that a run is ready to
/// execute. Grounded on `original_source/trigger/events/event_publisher.py`;
/// the default no-op implementation matches its `SKIP_EXTERNAL_EVENTS`
/// escape hatch for standalone/test operation.
#[async_trait::async_trait]
pub trait ExternalExecutorNotifier: Send + Sync {
    async fn push_ready_for_execution(&self, run_id: Uuid, trace_id: Uuid) -> anyhow::Result<()>;
}

pub struct NoopNotifier;

#[async_trait::async_trait]
impl ExternalExecutorNotifier for NoopNotifier {
    async fn push_ready_for_execution(&self, _run_id: Uuid, _trace_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct ScheduleDispatcher {
    store: Arc<dyn ScheduleStore>,
    broker: Arc<dyn MessageBroker>,
    scheduler: Arc<SchedulerService>,
    notifier: Arc<dyn ExternalExecutorNotifier>,
    events: Arc<EventBus>,
}

impl ScheduleDispatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        broker: Arc<dyn MessageBroker>,
        scheduler: Arc<SchedulerService>,
        notifier: Arc<dyn ExternalExecutorNotifier>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { store, broker, scheduler, notifier, events }
    }

    pub async fn run_forever(self: Arc<Self>) {
        let scheduled_dispatcher = Arc::clone(&self);
        let status_dispatcher = Arc::clone(&self);

        let scheduled = tokio::spawn(async move {
            if let Ok(mut rx) = scheduled_dispatcher.broker.consume("task.scheduled").await {
                while let Some(msg) = rx.recv().await {
                    if let Err(err) = scheduled_dispatcher.handle_scheduled(&msg).await {
                        error!(error = %err, "failed handling task.scheduled message");
                    }
                }
            }
        });

        let status = tokio::spawn(async move {
            if let Ok(mut rx) = status_dispatcher.broker.consume("task.status_update").await {
                while let Some(msg) = rx.recv().await {
                    if let Err(err) = status_dispatcher.handle_status_update(&msg).await {
                        error!(error = %err, "failed handling task.status_update message");
                    }
                }
            }
        });

        let _ = tokio::join!(scheduled, status);
    }

    async fn handle_scheduled(&self, msg: &BrokerMessage) -> anyhow::Result<()> {
        let run_id: Uuid = serde_json::from_value(msg.payload["run_id"].clone())?;
        let Some(run) = self.store.get_run(run_id).await? else {
            return Ok(());
        };

        // Idempotence: only act if the run is still SCHEDULED.
        if run.status != RunStatus::Scheduled {
            return Ok(());
        }

        match self.notifier.push_ready_for_execution(run.id, run.trace_id).await {
            Ok(()) => {
                self.store.transition_run_status(run.id, RunStatus::Scheduled, RunStatus::Dispatched).await?;
            }
            Err(err) => {
                warn!(run_id = %run.id, error = %err, "external notify failed, recording retry");
                self.store.record_retry(run.id, &err.to_string(), Utc::now()).await?;
            }
        }
        Ok(())
    }

    async fn handle_status_update(&self, msg: &BrokerMessage) -> anyhow::Result<()> {
        let run_id: Uuid = serde_json::from_value(msg.payload["run_id"].clone())?;
        let status_str = msg.payload["status"].as_str().unwrap_or("").to_uppercase();
        let Some(status) = RunStatus::from_str(&status_str) else {
            return Ok(());
        };

        let Some(run) = self.store.get_run(run_id).await? else {
            return Ok(());
        };

        if !status.is_terminal() {
            return Ok(());
        }

        self.store.transition_run_status(run.id, run.status, status).await?;

        self.events.publish(
            if status == RunStatus::Success { EventType::TaskCompleted } else { EventType::TaskFailed },
            run.trace_id,
            None,
            None,
            "schedule_dispatcher",
            json!({ "run_id": run.id, "status": status.as_str() }),
        );

        match run.schedule_type {
            ScheduleType::Cron => {
                if let Some(definition) = self.store.get_definition(run.definition_id).await? {
                    if let Some(expr) = &definition.cron_expression {
                        let base = definition.last_triggered_at.unwrap_or(run.scheduled_time);
                        let _ = self
                            .scheduler
                            .schedule_cron(run.definition_id, &run.tenant_id, expr, base, None)
                            .await;
                    }
                }
            }
            ScheduleType::Loop | ScheduleType::IntervalLoop => {
                let max_rounds = run.schedule_config["max_rounds"].as_u64().unwrap_or(1) as u32;
                let loop_interval = run.schedule_config["loop_interval"].as_i64();
                if run.round_index + 1 < max_rounds {
                    let next_time = loop_interval.map_or_else(Utc::now, |secs| Utc::now() + chrono::Duration::seconds(secs));
                    let _ = self
                        .scheduler
                        .trigger_loop_round(
                            run.definition_id,
                            &run.tenant_id,
                            run.trace_id,
                            run.round_index + 1,
                            max_rounds,
                            loop_interval,
                            next_time,
                        )
                        .await;
                }
            }
            ScheduleType::Immediate | ScheduleType::Delayed => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::adapters::memory::InMemoryMessageBroker;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteScheduleStore};
    use crate::domain::models::{ScheduledRun, TaskDefinition};

    struct CountingNotifier {
        calls: AtomicUsize,
    }

    impl CountingNotifier {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl ExternalExecutorNotifier for CountingNotifier {
        async fn push_ready_for_execution(&self, _run_id: Uuid, _trace_id: Uuid) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn dispatcher_with_store() -> (Arc<ScheduleDispatcher>, Arc<dyn ScheduleStore>, Arc<CountingNotifier>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let store: Arc<dyn ScheduleStore> = Arc::new(SqliteScheduleStore::new(pool));
        let broker: Arc<dyn MessageBroker> = Arc::new(InMemoryMessageBroker::new());
        let scheduler = Arc::new(SchedulerService::new(Arc::clone(&store)));
        let notifier = Arc::new(CountingNotifier::new());
        let events = Arc::new(EventBus::new());
        let dispatcher = Arc::new(ScheduleDispatcher::new(
            Arc::clone(&store),
            broker,
            scheduler,
            Arc::clone(&notifier) as Arc<dyn ExternalExecutorNotifier>,
            events,
        ));
        (dispatcher, store, notifier)
    }

    #[tokio::test]
    async fn cancelled_run_is_never_dispatched() {
        let (dispatcher, store, notifier) = dispatcher_with_store().await;
        let definition = TaskDefinition::new("immediate-job", "acme", ScheduleType::Immediate, json!({}));
        store.create_definition(&definition).await.unwrap();
        let run = ScheduledRun::new(definition.id, "acme", Uuid::new_v4(), ScheduleType::Immediate, Utc::now());
        store.create_run(&run).await.unwrap();
        store.transition_run_status(run.id, RunStatus::Pending, RunStatus::Cancelled).await.unwrap();

        let msg = BrokerMessage { topic: "task.scheduled".to_string(), payload: json!({ "run_id": run.id }) };
        dispatcher.handle_scheduled(&msg).await.unwrap();

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0, "a cancelled run must never reach the notifier");
        let reloaded = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn loop_rounds_stop_advancing_once_max_rounds_reached() {
        let (dispatcher, store, _notifier) = dispatcher_with_store().await;
        let definition = TaskDefinition::new("loop-job", "acme", ScheduleType::Loop, json!({}));
        store.create_definition(&definition).await.unwrap();

        let trace_id = Uuid::new_v4();
        let mut run = ScheduledRun::new(definition.id, "acme", trace_id, ScheduleType::Loop, Utc::now());
        run.round_index = 0;
        run.schedule_config = json!({ "max_rounds": 2, "loop_interval": serde_json::Value::Null });
        store.create_run(&run).await.unwrap();
        store.transition_run_status(run.id, RunStatus::Pending, RunStatus::Scheduled).await.unwrap();
        store.transition_run_status(run.id, RunStatus::Scheduled, RunStatus::Dispatched).await.unwrap();

        let msg = BrokerMessage { topic: "task.status_update".to_string(), payload: json!({ "run_id": run.id, "status": "SUCCESS" }) };
        dispatcher.handle_status_update(&msg).await.unwrap();

        let runs = store.list_runs(crate::domain::ports::RunFilter { definition_id: Some(definition.id), ..Default::default() }).await.unwrap();
        assert_eq!(runs.len(), 2, "round 0 completing with max_rounds=2 must schedule round 1");
        let next_round = runs.iter().find(|r| r.id != run.id).unwrap();
        assert_eq!(next_round.round_index, 1);
        assert_eq!(next_round.trace_id, trace_id);

        store.transition_run_status(next_round.id, RunStatus::Pending, RunStatus::Scheduled).await.unwrap();
        store.transition_run_status(next_round.id, RunStatus::Scheduled, RunStatus::Dispatched).await.unwrap();
        let msg2 = BrokerMessage { topic: "task.status_update".to_string(), payload: json!({ "run_id": next_round.id, "status": "SUCCESS" }) };
        dispatcher.handle_status_update(&msg2).await.unwrap();

        let runs_after = store.list_runs(crate::domain::ports::RunFilter { definition_id: Some(definition.id), ..Default::default() }).await.unwrap();
        assert_eq!(runs_after.len(), 2, "round 1 is the last round for max_rounds=2, no round 2 should be created");
    }
}
