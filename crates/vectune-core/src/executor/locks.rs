use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-scope mutual exclusion for index creation.
///
/// Cycles on different scopes never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct ScopeLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `scope`. Released when the guard drops.
    pub async fn acquire(&self, scope: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&self.locks.entry(scope.to_string()).or_default());
        lock.lock_owned().await
    }

    /// Number of scopes seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
