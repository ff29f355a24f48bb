//! Per-session mutual exclusion.
//!
//! A turn holds its session's lock for its whole duration, so two turns for
//! the same session serialize while turns for different sessions run in
//! parallel. Fine for a single-instance deployment; the store-level
//! compare-and-swap covers the multi-instance case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

pub struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for one session, waiting if a turn is in flight.
    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());

            // Periodic cleanup: drop locks nobody is holding or waiting on.
            if map.len() > 10_000 {
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            map.entry(session_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self::new()
    }
}
