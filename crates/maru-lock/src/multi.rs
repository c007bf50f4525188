use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::distributed::{DistributedLock, DistributedLockCoordinator};
use crate::error::LockError;

/// Acquires an ordered set of distributed locks as one all-or-nothing
/// operation around a unit of work.
///
/// Keys are deduplicated and sorted before acquisition; the fixed global
/// order means any two callers requesting overlapping key sets attempt them
/// in the same relative order, so no circular wait can form. If the full
/// set cannot be acquired within the shared wait budget, everything already
/// held is released and the caller gets a timeout — partial acquisition is
/// never observable.
#[derive(Clone)]
pub struct MultiLockExecutor {
    coordinator: DistributedLockCoordinator,
}

impl MultiLockExecutor {
    pub fn new(coordinator: DistributedLockCoordinator) -> Self {
        Self { coordinator }
    }

    pub async fn with_locks<T, F, Fut>(
        &self,
        keys: &[String],
        wait: Duration,
        work: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let keys = normalize_keys(keys);
        if keys.is_empty() {
            warn!("empty lock key set, running work without locks");
            return Ok(work().await);
        }

        let deadline = Instant::now() + wait;
        let mut held: Vec<DistributedLock> = Vec::with_capacity(keys.len());
        for key in &keys {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.coordinator.try_acquire(key, remaining).await {
                Ok(lock) => held.push(lock),
                Err(e) => {
                    warn!(?keys, failed_key = %key, "multi-lock acquisition failed, rolling back");
                    self.release_all(&mut held).await;
                    return Err(e);
                }
            }
        }
        debug!(?keys, "acquired multi-resource locks");

        let out = work().await;
        self.release_all(&mut held).await;
        Ok(out)
    }

    /// Release in reverse acquisition order. Already-released locks are a
    /// non-error inside `release`; anything else is logged and skipped so
    /// the remaining locks still get released.
    async fn release_all(&self, held: &mut Vec<DistributedLock>) {
        while let Some(lock) = held.pop() {
            if let Err(e) = self.coordinator.release(&lock).await {
                warn!(key = lock.key(), error = %e, "failed to release lock during multi-lock cleanup");
            }
        }
    }
}

/// Deduplicate and lexicographically sort the requested keys.
fn normalize_keys(keys: &[String]) -> Vec<String> {
    let mut keys = keys.to_vec();
    keys.sort();
    keys.dedup();
    keys
}
