//! SQLite-backed Control Signal Store (C13). Grounded on
//! `original_source/tasks/control_signal_store.py`'s task-scoped-wins-over-
//! trace-scoped precedence rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::{DatabaseError, DomainResult};
use crate::domain::models::{ControlSignal, SignalKind};
use crate::domain::ports::ControlSignalStore;

pub struct SqliteControlSignalStore {
    pool: SqlitePool,
}

impl SqliteControlSignalStore {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, key: &str) -> DomainResult<Option<ControlSignal>> {
        let row = sqlx::query("SELECT * FROM control_signals WHERE signal_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        row.as_ref().map(signal_from_row).transpose()
    }
}

fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::SerializationError(e.to_string()).into())
}

fn signal_from_row(row: &sqlx::sqlite::SqliteRow) -> DomainResult<ControlSignal> {
    let kind_str: String = row.try_get("kind").map_err(DatabaseError::QueryFailed)?;
    Ok(ControlSignal {
        kind: SignalKind::from_str(&kind_str).ok_or_else(|| DatabaseError::SerializationError(format!("unknown signal kind: {kind_str}")))?,
        trace_id: Uuid::parse_str(&row.try_get::<String, _>("trace_id").map_err(DatabaseError::QueryFailed)?)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
        task_id: row
            .try_get::<Option<String>, _>("task_id")
            .map_err(DatabaseError::QueryFailed)?
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
        modify_payload: row
            .try_get::<Option<String>, _>("modify_payload")
            .map_err(DatabaseError::QueryFailed)?
            .map(|s| serde_json::from_str(&s))
            .transpose()?,
        issued_at: parse_datetime(&row.try_get::<String, _>("issued_at").map_err(DatabaseError::QueryFailed)?)?,
    })
}

#[async_trait]
impl ControlSignalStore for SqliteControlSignalStore {
    async fn set(&self, signal: ControlSignal) -> DomainResult<()> {
        let key = match signal.task_id {
            Some(task_id) => ControlSignal::task_key(task_id),
            None => ControlSignal::trace_key(signal.trace_id),
        };

        sqlx::query(
            "INSERT INTO control_signals (signal_key, kind, trace_id, task_id, modify_payload, issued_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (signal_key) DO UPDATE SET
                kind = excluded.kind,
                modify_payload = excluded.modify_payload,
                issued_at = excluded.issued_at",
        )
        .bind(&key)
        .bind(signal.kind.as_str())
        .bind(signal.trace_id.to_string())
        .bind(signal.task_id.map(|id| id.to_string()))
        .bind(signal.modify_payload.as_ref().map(serde_json::to_string).transpose()?)
        .bind(signal.issued_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get_effective(&self, trace_id: Uuid, task_id: Option<Uuid>) -> DomainResult<Option<ControlSignal>> {
        if let Some(task_id) = task_id {
            if let Some(signal) = self.fetch(&ControlSignal::task_key(task_id)).await? {
                return Ok(Some(signal));
            }
        }
        self.fetch(&ControlSignal::trace_key(trace_id)).await
    }

    async fn clear_trace(&self, trace_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM control_signals WHERE signal_key = ?")
            .bind(ControlSignal::trace_key(trace_id))
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn clear_task(&self, task_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM control_signals WHERE signal_key = ?")
            .bind(ControlSignal::task_key(task_id))
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn store() -> SqliteControlSignalStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteControlSignalStore::new(pool)
    }

    #[tokio::test]
    async fn task_scoped_signal_takes_precedence_over_trace_scoped() {
        let store = store().await;
        let trace_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        store
            .set(ControlSignal { kind: SignalKind::Pause, trace_id, task_id: None, modify_payload: None, issued_at: Utc::now() })
            .await
            .unwrap();
        store
            .set(ControlSignal { kind: SignalKind::Cancel, trace_id, task_id: Some(task_id), modify_payload: None, issued_at: Utc::now() })
            .await
            .unwrap();

        let effective = store.get_effective(trace_id, Some(task_id)).await.unwrap().unwrap();
        assert_eq!(effective.kind, SignalKind::Cancel);

        // A different task in the same trace still sees the trace-scoped signal.
        let other_task = Uuid::new_v4();
        let effective_other = store.get_effective(trace_id, Some(other_task)).await.unwrap().unwrap();
        assert_eq!(effective_other.kind, SignalKind::Pause);
    }

    #[tokio::test]
    async fn clear_trace_removes_only_trace_scoped_signal() {
        let store = store().await;
        let trace_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();

        store
            .set(ControlSignal { kind: SignalKind::Pause, trace_id, task_id: None, modify_payload: None, issued_at: Utc::now() })
            .await
            .unwrap();
        store
            .set(ControlSignal { kind: SignalKind::Resume, trace_id, task_id: Some(task_id), modify_payload: None, issued_at: Utc::now() })
            .await
            .unwrap();

        store.clear_trace(trace_id).await.unwrap();

        assert!(store.get_effective(trace_id, None).await.unwrap().is_none());
        assert_eq!(store.get_effective(trace_id, Some(task_id)).await.unwrap().unwrap().kind, SignalKind::Resume);
    }

    #[tokio::test]
    async fn set_with_modify_payload_round_trips() {
        let store = store().await;
        let trace_id = Uuid::new_v4();
        let payload = serde_json::json!({ "input_params": { "x": 1 } });

        store
            .set(ControlSignal { kind: SignalKind::Resume, trace_id, task_id: None, modify_payload: Some(payload.clone()), issued_at: Utc::now() })
            .await
            .unwrap();

        let effective = store.get_effective(trace_id, None).await.unwrap().unwrap();
        assert_eq!(effective.modify_payload, Some(payload));
    }
}
