//! SQLite-backed Reference Registry (C1). Durable so a NEED_INPUT resume
//! link survives an Agent process restart. Grounded on the original's
//! `ActorReferenceManager` key scheme (`{prefix}:{tenant_id}:{node_id}`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::{DatabaseError, DomainResult};
use crate::domain::models::ActorReference;
use crate::domain::ports::ReferenceRegistry;

pub struct SqliteReferenceRegistry {
    pool: SqlitePool,
}

impl SqliteReferenceRegistry {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::SerializationError(e.to_string()).into())
}

fn reference_from_row(row: &sqlx::sqlite::SqliteRow) -> DomainResult<ActorReference> {
    Ok(ActorReference {
        tenant_id: row.try_get("tenant_id").map_err(DatabaseError::QueryFailed)?,
        node_id: row.try_get("node_id").map_err(DatabaseError::QueryFailed)?,
        address_handle: Uuid::parse_str(&row.try_get::<String, _>("address_handle").map_err(DatabaseError::QueryFailed)?)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?,
        registered_at: parse_datetime(&row.try_get::<String, _>("registered_at").map_err(DatabaseError::QueryFailed)?)?,
        last_heartbeat_at: parse_datetime(&row.try_get::<String, _>("last_heartbeat_at").map_err(DatabaseError::QueryFailed)?)?,
        expires_at: parse_datetime(&row.try_get::<String, _>("expires_at").map_err(DatabaseError::QueryFailed)?)?,
    })
}

#[async_trait]
impl ReferenceRegistry for SqliteReferenceRegistry {
    async fn save(&self, reference: ActorReference) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO actor_references (tenant_id, node_id, address_handle, registered_at, last_heartbeat_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, node_id) DO UPDATE SET
                address_handle = excluded.address_handle,
                registered_at = excluded.registered_at,
                last_heartbeat_at = excluded.last_heartbeat_at,
                expires_at = excluded.expires_at",
        )
        .bind(&reference.tenant_id)
        .bind(&reference.node_id)
        .bind(reference.address_handle.to_string())
        .bind(reference.registered_at.to_rfc3339())
        .bind(reference.last_heartbeat_at.to_rfc3339())
        .bind(reference.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, node_id: &str) -> DomainResult<Option<ActorReference>> {
        let row = sqlx::query("SELECT * FROM actor_references WHERE tenant_id = ? AND node_id = ?")
            .bind(tenant_id)
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;

        let Some(row) = row else { return Ok(None) };
        let reference = reference_from_row(&row)?;
        if reference.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(reference))
    }

    async fn delete(&self, tenant_id: &str, node_id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM actor_references WHERE tenant_id = ? AND node_id = ?")
            .bind(tenant_id)
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(())
    }

    async fn refresh_ttl(&self, tenant_id: &str, node_id: &str, ttl_secs: i64) -> DomainResult<bool> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl_secs);
        let result = sqlx::query("UPDATE actor_references SET expires_at = ? WHERE tenant_id = ? AND node_id = ?")
            .bind(expires_at.to_rfc3339())
            .bind(tenant_id)
            .bind(node_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::QueryFailed)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_heartbeat(&self, tenant_id: &str, node_id: &str, ttl_secs: i64) -> DomainResult<bool> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::seconds(ttl_secs);
        let result = sqlx::query(
            "UPDATE actor_references SET last_heartbeat_at = ?, expires_at = ? WHERE tenant_id = ? AND node_id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .bind(tenant_id)
        .bind(node_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::QueryFailed)?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, tenant_id: &str, node_id: &str) -> DomainResult<bool> {
        Ok(self.get(tenant_id, node_id).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn registry() -> SqliteReferenceRegistry {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteReferenceRegistry::new(pool)
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let registry = registry().await;
        let reference = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        registry.save(reference.clone()).await.unwrap();

        let fetched = registry.get("acme", "node-0").await.unwrap().unwrap();
        assert_eq!(fetched.address_handle, reference.address_handle);
        assert!(registry.exists("acme", "node-0").await.unwrap());
    }

    #[tokio::test]
    async fn expired_reference_is_invisible_to_get() {
        let registry = registry().await;
        let mut reference = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        reference.expires_at = Utc::now() - chrono::Duration::seconds(1);
        registry.save(reference).await.unwrap();

        assert!(registry.get("acme", "node-0").await.unwrap().is_none());
        assert!(!registry.exists("acme", "node-0").await.unwrap());
    }

    #[tokio::test]
    async fn refresh_ttl_extends_expiry_past_now() {
        let registry = registry().await;
        let mut reference = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        reference.expires_at = Utc::now() - chrono::Duration::seconds(1);
        registry.save(reference).await.unwrap();
        assert!(registry.get("acme", "node-0").await.unwrap().is_none());

        assert!(registry.refresh_ttl("acme", "node-0", 3600).await.unwrap());
        assert!(registry.get("acme", "node-0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_overwrites_existing_registration_for_same_key() {
        let registry = registry().await;
        let first = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        registry.save(first).await.unwrap();

        let second = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        registry.save(second.clone()).await.unwrap();

        let fetched = registry.get("acme", "node-0").await.unwrap().unwrap();
        assert_eq!(fetched.address_handle, second.address_handle);
    }

    #[tokio::test]
    async fn delete_removes_registration() {
        let registry = registry().await;
        let reference = ActorReference::new("acme", "node-0", Uuid::new_v4(), 3600);
        registry.save(reference).await.unwrap();
        registry.delete("acme", "node-0").await.unwrap();

        assert!(registry.get("acme", "node-0").await.unwrap().is_none());
    }
}
