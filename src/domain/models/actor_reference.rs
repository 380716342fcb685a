//! Actor Reference: an address registration in the Reference Registry,
//! keyed by (tenant, node) with a refreshable TTL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered actor address, at most one per (tenant_id, node_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorReference {
    pub tenant_id: String,
    pub node_id: String,
    /// Opaque, process-local address handle. See SPEC_FULL.md §3 for why
    /// this is a handle rather than a literal channel — channels can't be
    /// serialized, so the registry stores a lookup key into an in-process
    /// address table instead.
    pub address_handle: Uuid,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ActorReference {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, node_id: impl Into<String>, address_handle: Uuid, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.into(),
            node_id: node_id.into(),
            address_handle,
            registered_at: now,
            last_heartbeat_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn refresh(&mut self, ttl_secs: i64, now: DateTime<Utc>) {
        self.last_heartbeat_at = now;
        self.expires_at = now + chrono::Duration::seconds(ttl_secs);
    }

    /// Registry key exactly matching the `{prefix}:{tenant_id}:{node_id}`
    /// format used by the original's `ActorReferenceManager`.
    #[must_use]
    pub fn registry_key(prefix: &str, tenant_id: &str, node_id: &str) -> String {
        format!("{prefix}:{tenant_id}:{node_id}")
    }
}
