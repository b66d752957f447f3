// src/services/locks.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per `(user_id, paper_id)`.
///
/// Serializes the check-then-commit part of a submission inside this process.
/// Entries nobody holds are pruned on the next acquire.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<(i64, i64), Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: i64, paper_id: i64) -> OwnedMutexGuard<()> {
        let slot = {
            // A poisoned map only means another task panicked mid-insert;
            // the map itself is still usable.
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry((user_id, paper_id))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
