//! Capability registry: maps a task's `capability` string to the
//! `Connector` that runs it, built once at startup. Grounded on
//! `original_source/tasks/capability_actors/execution_actor.py`'s
//! prefix-dispatch (`dify`/`dify_workflow` -> one handler, `http`/`http_*`
//! -> another) and on spec.md §9's "registry from string to function
//! object constructed at startup" design note.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ports::Connector;

pub struct CapabilityRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { connectors: HashMap::new() }
    }

    pub fn register(&mut self, capability_prefix: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors.insert(capability_prefix.into(), connector);
    }

    /// Resolve a capability string by exact match, then by longest
    /// registered prefix (so `"http_get"` matches a `"http"` registration),
    /// matching the original's `startswith` dispatch.
    #[must_use]
    pub fn resolve(&self, capability: &str) -> Option<Arc<dyn Connector>> {
        if let Some(exact) = self.connectors.get(capability) {
            return Some(Arc::clone(exact));
        }
        self.connectors
            .iter()
            .filter(|(prefix, _)| capability.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, connector)| Arc::clone(connector))
    }
}
