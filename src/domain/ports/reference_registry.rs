//! Port for the Reference Registry (C1): at-most-one actor address per
//! (tenant_id, node_id), with a refreshable TTL and heartbeat tracking.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::ActorReference;

#[async_trait]
pub trait ReferenceRegistry: Send + Sync {
    /// Register (or overwrite) the address for (tenant_id, node_id).
    async fn save(&self, reference: ActorReference) -> DomainResult<()>;

    /// Look up the current address, if any and not expired.
    async fn get(&self, tenant_id: &str, node_id: &str) -> DomainResult<Option<ActorReference>>;

    /// Remove the registration outright (actor shutdown).
    async fn delete(&self, tenant_id: &str, node_id: &str) -> DomainResult<()>;

    /// Push the expiry out by the configured TTL from now.
    async fn refresh_ttl(&self, tenant_id: &str, node_id: &str, ttl_secs: i64) -> DomainResult<bool>;

    /// Record a heartbeat (updates `last_heartbeat_at` and refreshes TTL).
    async fn update_heartbeat(&self, tenant_id: &str, node_id: &str, ttl_secs: i64) -> DomainResult<bool>;

    /// Whether a live (non-expired) registration exists.
    async fn exists(&self, tenant_id: &str, node_id: &str) -> DomainResult<bool>;
}
