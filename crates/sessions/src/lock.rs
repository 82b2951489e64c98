//! Per-identity serialization of first-contact session creation.
//!
//! Only one task per identity may run the "no session yet → create thread
//! → insert" sequence at a time, so concurrent first requests share a
//! single thread instead of each creating one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Manages per-identity creation locks.
///
/// Each identity maps to an async mutex while anyone holds or waits for it;
/// idle entries are pruned on the next acquisition.
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for IdentityLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access for `identity`.  The lock is released when
    /// the returned guard drops.
    pub async fn acquire(&self, identity: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks
                .entry(identity.to_owned())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
