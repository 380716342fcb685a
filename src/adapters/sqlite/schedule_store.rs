//! SQLite-backed Schedule Store (C3). Grounded on the connection/migration
//! conventions in `connection.rs`/`migrations.rs` and on the original's
//! `repositories/task_schedule_repository.py` for the guarded
//! compare-and-swap transition semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::{DatabaseError, DomainResult};
use crate::domain::models::{
    InstanceStatus, RunStatus, ScheduleType, ScheduledRun, TaskDefinition, TaskInstance,
};
use crate::domain::ports::schedule_store::{RunFilter, ScheduleStore};

pub struct SqliteScheduleStore {
    pool: SqlitePool,
}

impl SqliteScheduleStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::SerializationError(e.to_string()).into())
}

fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::SerializationError(e.to_string()).into())
}

fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(&s)).transpose()
}

fn parse_schedule_type(s: &str) -> DomainResult<ScheduleType> {
    ScheduleType::from_str(s).ok_or_else(|| DatabaseError::SerializationError(format!("unknown schedule_type: {s}")).into())
}

fn parse_run_status(s: &str) -> DomainResult<RunStatus> {
    RunStatus::from_str(s).ok_or_else(|| DatabaseError::SerializationError(format!("unknown run status: {s}")).into())
}

fn definition_from_row(row: &sqlx::sqlite::SqliteRow) -> DomainResult<TaskDefinition> {
    Ok(TaskDefinition {
        id: parse_uuid(row.try_get::<String, _>("id").map_err(|e| DatabaseError::QueryFailed(e))?.as_str())?,
        name: row.try_get("name").map_err(DatabaseError::QueryFailed)?,
        description: row.try_get::<Option<String>, _>("description").map_err(DatabaseError::QueryFailed)?.unwrap_or_default(),
        tenant_id: row.try_get("tenant_id").map_err(DatabaseError::QueryFailed)?,
        schedule_type: parse_schedule_type(&row.try_get::<String, _>("schedule_type").map_err(DatabaseError::QueryFailed)?)?,
        cron_expression: row.try_get("cron_expression").map_err(DatabaseError::QueryFailed)?,
        delay_secs: row.try_get("delay_secs").map_err(DatabaseError::QueryFailed)?,
        loop_interval_secs: row.try_get("loop_interval_secs").map_err(DatabaseError::QueryFailed)?,
        max_rounds: row
            .try_get::<Option<i64>, _>("max_rounds")
            .map_err(DatabaseError::QueryFailed)?
            .map(|v| v as u32),
        content: serde_json::from_str(&row.try_get::<String, _>("content").map_err(DatabaseError::QueryFailed)?)?,
        agent_type: row.try_get("agent_type").map_err(DatabaseError::QueryFailed)?,
        default_timeout_secs: row.try_get("default_timeout_secs").map_err(DatabaseError::QueryFailed)?,
        is_temporary: row.try_get::<i64, _>("is_temporary").map_err(DatabaseError::QueryFailed)? != 0,
        is_active: row.try_get::<i64, _>("is_active").map_err(DatabaseError::QueryFailed)? != 0,
        last_triggered_at: parse_optional_datetime(row.try_get("last_triggered_at").map_err(DatabaseError::QueryFailed)?)?,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(DatabaseError::QueryFailed)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(DatabaseError::QueryFailed)?)?,
    })
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> DomainResult<ScheduledRun> {
    Ok(ScheduledRun {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(DatabaseError::QueryFailed)?)?,
        definition_id: parse_uuid(&row.try_get::<String, _>("definition_id").map_err(DatabaseError::QueryFailed)?)?,
        tenant_id: row.try_get("tenant_id").map_err(DatabaseError::QueryFailed)?,
        trace_id: parse_uuid(&row.try_get::<String, _>("trace_id").map_err(DatabaseError::QueryFailed)?)?,
        round_index: row.try_get::<i64, _>("round_index").map_err(DatabaseError::QueryFailed)? as u32,
        schedule_type: parse_schedule_type(&row.try_get::<String, _>("schedule_type").map_err(DatabaseError::QueryFailed)?)?,
        status: parse_run_status(&row.try_get::<String, _>("status").map_err(DatabaseError::QueryFailed)?)?,
        scheduled_time: parse_datetime(&row.try_get::<String, _>("scheduled_time").map_err(DatabaseError::QueryFailed)?)?,
        schedule_config: serde_json::from_str(&row.try_get::<String, _>("schedule_config").map_err(DatabaseError::QueryFailed)?)?,
        retry_count: row.try_get::<i64, _>("retry_count").map_err(DatabaseError::QueryFailed)? as u32,
        last_error: row.try_get("last_error").map_err(DatabaseError::QueryFailed)?,
        request_id: row.try_get("request_id").map_err(DatabaseError::QueryFailed)?,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(DatabaseError::QueryFailed)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(DatabaseError::QueryFailed)?)?,
    })
}

fn instance_from_row(row: &sqlx::sqlite::SqliteRow) -> DomainResult<TaskInstance> {
    let status_str: String = row.try_get("status").map_err(DatabaseError::QueryFailed)?;
    Ok(TaskInstance {
        id: parse_uuid(&row.try_get::<String, _>("id").map_err(DatabaseError::QueryFailed)?)?,
        trace_id: parse_uuid(&row.try_get::<String, _>("trace_id").map_err(DatabaseError::QueryFailed)?)?,
        tenant_id: row.try_get("tenant_id").map_err(DatabaseError::QueryFailed)?,
        task_path: row.try_get("task_path").map_err(DatabaseError::QueryFailed)?,
        parent_id: row
            .try_get::<Option<String>, _>("parent_id")
            .map_err(DatabaseError::QueryFailed)?
            .map(|s| parse_uuid(&s))
            .transpose()?,
        layer: row.try_get::<i64, _>("layer").map_err(DatabaseError::QueryFailed)? as u32,
        status: InstanceStatus::from_str(&status_str)
            .ok_or_else(|| DatabaseError::SerializationError(format!("unknown instance status: {status_str}")))?,
        content: serde_json::from_str(&row.try_get::<String, _>("content").map_err(DatabaseError::QueryFailed)?)?,
        result: row
            .try_get::<Option<String>, _>("result")
            .map_err(DatabaseError::QueryFailed)?
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
        error: row.try_get("error").map_err(DatabaseError::QueryFailed)?,
        created_at: parse_datetime(&row.try_get::<String, _>("created_at").map_err(DatabaseError::QueryFailed)?)?,
        updated_at: parse_datetime(&row.try_get::<String, _>("updated_at").map_err(DatabaseError::QueryFailed)?)?,
    })
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn create_definition(&self, definition: &TaskDefinition) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO task_definitions
             (id, name, description, tenant_id, schedule_type, cron_expression, delay_secs,
              loop_interval_secs, max_rounds, content, agent_type, default_timeout_secs, is_temporary, is_active,
              last_triggered_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(definition.id.to_string())
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.tenant_id)
        .bind(definition.schedule_type.as_str())
        .bind(&definition.cron_expression)
        .bind(definition.delay_secs)
        .bind(definition.loop_interval_secs)
        .bind(definition.max_rounds.map(i64::from))
        .bind(serde_json::to_string(&definition.content)?)
        .bind(&definition.agent_type)
        .bind(definition.default_timeout_secs)
        .bind(i64::from(definition.is_temporary))
        .bind(i64::from(definition.is_active))
        .bind(definition.last_triggered_at.map(|dt| dt.to_rfc3339()))
        .bind(definition.created_at.to_rfc3339())
        .bind(definition.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> DomainResult<Option<TaskDefinition>> {
        let row = sqlx::query("SELECT * FROM task_definitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        row.as_ref().map(definition_from_row).transpose()
    }

    async fn list_definitions(&self, tenant_id: &str) -> DomainResult<Vec<TaskDefinition>> {
        let rows = sqlx::query("SELECT * FROM task_definitions WHERE tenant_id = ? ORDER BY created_at")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn list_active_cron_definitions(&self) -> DomainResult<Vec<TaskDefinition>> {
        let rows = sqlx::query("SELECT * FROM task_definitions WHERE schedule_type = 'CRON' AND is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        rows.iter().map(definition_from_row).collect()
    }

    async fn update_last_triggered_at(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query("UPDATE task_definitions SET last_triggered_at = ?, updated_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn create_run(&self, run: &ScheduledRun) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_runs
             (id, definition_id, tenant_id, trace_id, round_index, schedule_type, status,
              scheduled_time, schedule_config, retry_count, last_error, request_id,
              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.to_string())
        .bind(run.definition_id.to_string())
        .bind(&run.tenant_id)
        .bind(run.trace_id.to_string())
        .bind(i64::from(run.round_index))
        .bind(run.schedule_type.as_str())
        .bind(run.status.as_str())
        .bind(run.scheduled_time.to_rfc3339())
        .bind(serde_json::to_string(&run.schedule_config)?)
        .bind(i64::from(run.retry_count))
        .bind(&run.last_error)
        .bind(&run.request_id)
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> DomainResult<Option<ScheduledRun>> {
        let row = sqlx::query("SELECT * FROM scheduled_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn list_runs(&self, filter: RunFilter) -> DomainResult<Vec<ScheduledRun>> {
        let mut sql = "SELECT * FROM scheduled_runs WHERE 1=1".to_string();
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.definition_id.is_some() {
            sql.push_str(" AND definition_id = ?");
        }
        if filter.trace_id.is_some() {
            sql.push_str(" AND trace_id = ?");
        }
        sql.push_str(" ORDER BY scheduled_time");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(definition_id) = filter.definition_id {
            query = query.bind(definition_id.to_string());
        }
        if let Some(trace_id) = filter.trace_id {
            query = query.bind(trace_id.to_string());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(DatabaseError::QueryFailed)?;
        rows.iter().map(run_from_row).collect()
    }

    async fn get_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<ScheduledRun>> {
        let rows = sqlx::query("SELECT * FROM scheduled_runs WHERE status = 'PENDING' AND scheduled_time <= ? ORDER BY scheduled_time")
            .bind(now.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        rows.iter().map(run_from_row).collect()
    }

    async fn transition_run_status(&self, id: Uuid, expected: RunStatus, next: RunStatus) -> DomainResult<bool> {
        if !expected.can_transition_to(next) {
            return Err(crate::domain::error::DomainError::InvalidTransition {
                from: expected.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let result = sqlx::query("UPDATE scheduled_runs SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_retry(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query(
            "UPDATE scheduled_runs
             SET retry_count = retry_count + 1, last_error = ?, scheduled_time = ?, status = 'PENDING', updated_at = ?
             WHERE id = ?",
        )
        .bind(error)
        .bind(next_attempt_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn create_instance(&self, instance: &TaskInstance) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO task_instances
             (id, trace_id, tenant_id, task_path, parent_id, layer, status, content, result, error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(instance.id.to_string())
        .bind(instance.trace_id.to_string())
        .bind(&instance.tenant_id)
        .bind(&instance.task_path)
        .bind(instance.parent_id.map(|id| id.to_string()))
        .bind(i64::from(instance.layer))
        .bind(instance.status.as_str())
        .bind(serde_json::to_string(&instance.content)?)
        .bind(instance.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(&instance.error)
        .bind(instance.created_at.to_rfc3339())
        .bind(instance.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get_instance(&self, id: Uuid) -> DomainResult<Option<TaskInstance>> {
        let row = sqlx::query("SELECT * FROM task_instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        row.as_ref().map(instance_from_row).transpose()
    }

    async fn update_instance(&self, instance: &TaskInstance) -> DomainResult<()> {
        sqlx::query("UPDATE task_instances SET status = ?, result = ?, error = ?, updated_at = ? WHERE id = ?")
            .bind(instance.status.as_str())
            .bind(instance.result.as_ref().map(serde_json::to_string).transpose()?)
            .bind(&instance.error)
            .bind(Utc::now().to_rfc3339())
            .bind(instance.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn list_instances_by_trace(&self, trace_id: Uuid) -> DomainResult<Vec<TaskInstance>> {
        let rows = sqlx::query("SELECT * FROM task_instances WHERE trace_id = ? ORDER BY layer, created_at")
            .bind(trace_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        rows.iter().map(instance_from_row).collect()
    }

    async fn bind_request_id(&self, request_id: &str, trace_id: Uuid) -> DomainResult<()> {
        // request_id/trace_id pairs live alongside their originating run, so
        // rebind by updating any matching rows rather than a separate table.
        sqlx::query("UPDATE scheduled_runs SET request_id = ? WHERE trace_id = ? AND request_id IS NULL")
            .bind(request_id)
            .bind(trace_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get_trace_by_request_id(&self, request_id: &str) -> DomainResult<Option<Uuid>> {
        let row = sqlx::query("SELECT trace_id FROM scheduled_runs WHERE request_id = ? LIMIT 1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        row.map(|r| parse_uuid(&r.try_get::<String, _>("trace_id").map_err(DatabaseError::QueryFailed)?))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn store() -> SqliteScheduleStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteScheduleStore::new(pool)
    }

    #[tokio::test]
    async fn create_and_get_definition_round_trips() {
        let store = store().await;
        let def = TaskDefinition::new("nightly-sync", "acme", ScheduleType::Cron, serde_json::json!({"capability": "mock"}))
            .with_cron("0 2 * * *")
            .with_active(false);

        store.create_definition(&def).await.unwrap();
        let fetched = store.get_definition(def.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "nightly-sync");
        assert_eq!(fetched.cron_expression.as_deref(), Some("0 2 * * *"));
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn list_active_cron_definitions_excludes_inactive() {
        let store = store().await;
        let active = TaskDefinition::new("active-cron", "acme", ScheduleType::Cron, serde_json::json!({})).with_cron("* * * * *");
        let inactive =
            TaskDefinition::new("inactive-cron", "acme", ScheduleType::Cron, serde_json::json!({})).with_cron("* * * * *").with_active(false);
        let immediate = TaskDefinition::new("one-shot", "acme", ScheduleType::Immediate, serde_json::json!({}));

        store.create_definition(&active).await.unwrap();
        store.create_definition(&inactive).await.unwrap();
        store.create_definition(&immediate).await.unwrap();

        let cron_defs = store.list_active_cron_definitions().await.unwrap();
        assert_eq!(cron_defs.len(), 1);
        assert_eq!(cron_defs[0].id, active.id);
    }

    #[tokio::test]
    async fn transition_run_status_rejects_illegal_edge() {
        let store = store().await;
        let def = TaskDefinition::new("d", "acme", ScheduleType::Immediate, serde_json::json!({}));
        store.create_definition(&def).await.unwrap();
        let run = ScheduledRun::new(def.id, "acme", Uuid::new_v4(), ScheduleType::Immediate, Utc::now());
        store.create_run(&run).await.unwrap();

        let err = store.transition_run_status(run.id, RunStatus::Pending, RunStatus::Dispatched).await.unwrap_err();
        assert!(matches!(err, crate::domain::error::DomainError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn transition_run_status_is_compare_and_swap() {
        let store = store().await;
        let def = TaskDefinition::new("d", "acme", ScheduleType::Immediate, serde_json::json!({}));
        store.create_definition(&def).await.unwrap();
        let run = ScheduledRun::new(def.id, "acme", Uuid::new_v4(), ScheduleType::Immediate, Utc::now());
        store.create_run(&run).await.unwrap();

        // First caller wins the PENDING -> SCHEDULED transition.
        assert!(store.transition_run_status(run.id, RunStatus::Pending, RunStatus::Scheduled).await.unwrap());
        // A second caller racing on the same expected status loses.
        assert!(!store.transition_run_status(run.id, RunStatus::Pending, RunStatus::Scheduled).await.unwrap());

        let fetched = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Scheduled);
    }

    #[tokio::test]
    async fn bind_request_id_then_lookup_by_request_id() {
        let store = store().await;
        let def = TaskDefinition::new("d", "acme", ScheduleType::Immediate, serde_json::json!({}));
        store.create_definition(&def).await.unwrap();
        let trace_id = Uuid::new_v4();
        let run = ScheduledRun::new(def.id, "acme", trace_id, ScheduleType::Immediate, Utc::now());
        store.create_run(&run).await.unwrap();

        store.bind_request_id("req-123", trace_id).await.unwrap();
        let found = store.get_trace_by_request_id("req-123").await.unwrap();
        assert_eq!(found, Some(trace_id));
        assert_eq!(store.get_trace_by_request_id("no-such-request").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_pending_only_returns_due_runs() {
        let store = store().await;
        let def = TaskDefinition::new("d", "acme", ScheduleType::Immediate, serde_json::json!({}));
        store.create_definition(&def).await.unwrap();

        let now = Utc::now();
        let due = ScheduledRun::new(def.id, "acme", Uuid::new_v4(), ScheduleType::Immediate, now - chrono::Duration::seconds(5));
        let future = ScheduledRun::new(def.id, "acme", Uuid::new_v4(), ScheduleType::Immediate, now + chrono::Duration::hours(1));
        store.create_run(&due).await.unwrap();
        store.create_run(&future).await.unwrap();

        let pending = store.get_pending(now).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, due.id);
    }
}
