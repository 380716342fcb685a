//! In-process address directory.
//!
//! The Reference Registry (C1) stores only an opaque `Uuid` "address
//! handle" per spec.md §3/§9 (addresses don't serialize across a process
//! boundary). This directory is the other half: it resolves a handle back
//! to the live `mpsc::Sender` it was issued for, within this process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

pub struct AddressDirectory<M> {
    table: RwLock<HashMap<Uuid, tokio::sync::mpsc::Sender<M>>>,
}

impl<M> Default for AddressDirectory<M> {
    fn default() -> Self {
        Self { table: RwLock::new(HashMap::new()) }
    }
}

impl<M> AddressDirectory<M> {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an address and return the handle that resolves to it.
    pub async fn register(&self, address: tokio::sync::mpsc::Sender<M>) -> Uuid {
        let handle = Uuid::new_v4();
        self.table.write().await.insert(handle, address);
        handle
    }

    pub async fn resolve(&self, handle: Uuid) -> Option<tokio::sync::mpsc::Sender<M>> {
        self.table.read().await.get(&handle).cloned()
    }

    pub async fn remove(&self, handle: Uuid) {
        self.table.write().await.remove(&handle);
    }
}
