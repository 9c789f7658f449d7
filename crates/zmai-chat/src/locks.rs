//! Per-conversation mutual exclusion.
//!
//! Turns on the same conversation id run one at a time; turns on different
//! ids never wait for each other. Entries disappear once no turn holds or
//! awaits them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async locks keyed by conversation id.
#[derive(Debug, Default)]
pub struct ConversationLocks {
    entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Access lasts until the guard drops.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(id).lock_owned().await
    }

    /// Number of ids currently held or awaited.
    pub fn active(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|w| w.strong_count() > 0).count()
    }

    fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        // The map holds no invariant a panicking holder could break.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = entries.get(id).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        entries.insert(id.to_string(), Arc::downgrade(&lock));
        lock
    }
}
