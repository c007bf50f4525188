use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use deadpool_redis::Pool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LockError;

/// Compose the Redis key for a lock from a domain prefix and an entity id,
/// e.g. `lock_key("COUPON", 7)` → `"LOCK:COUPON:7"`.
pub fn lock_key(domain: &str, id: impl Display) -> String {
    format!("LOCK:{domain}:{id}")
}

/// Delete the key only while it still holds our token. A mismatch means the
/// lease expired and another holder (or nobody) owns the key now.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Handle for one held distributed lock. Pass it back to
/// [`DistributedLockCoordinator::release`].
#[derive(Debug)]
pub struct DistributedLock {
    key: String,
    token: String,
}

impl DistributedLock {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Acquires and releases named locks in Redis.
///
/// A lock is `SET key <token> NX PX <lease>`: the token fences the release
/// and the lease bounds how long a crashed holder can keep the key. The
/// lease is advisory and independent of any database transaction running
/// inside the critical section — callers must make sure their transaction
/// has committed before the lock is released, which [`Self::with_lock`]
/// guarantees by releasing only after the work future has resolved.
#[derive(Clone)]
pub struct DistributedLockCoordinator {
    pool: Pool,
    lease: Duration,
    retry_interval: Duration,
}

impl DistributedLockCoordinator {
    pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            lease: Self::DEFAULT_LEASE,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Block up to `wait` for the lock. On timeout returns
    /// [`LockError::AcquisitionTimeout`] without retrying further — whether
    /// to retry, queue, or surface "busy" is the caller's decision.
    pub async fn try_acquire(
        &self,
        key: &str,
        wait: Duration,
    ) -> Result<DistributedLock, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + wait;
        loop {
            if self.acquire_once(key, &token).await? {
                debug!(key, "acquired distributed lock");
                return Ok(DistributedLock {
                    key: key.to_owned(),
                    token,
                });
            }
            if Instant::now() + self.retry_interval > deadline {
                warn!(key, wait_ms = wait.as_millis() as u64, "lock acquisition timed out");
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_owned(),
                    wait_ms: wait.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn acquire_once(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LockError::Internal(e.into()))?;
        let reply: Option<String> = deadpool_redis::redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.lease.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Internal(e.into()))?;
        Ok(reply.is_some())
    }

    /// Release a held lock. Releasing a lock that is no longer ours — the
    /// lease expired, or it was already released — is logged and ignored,
    /// never an error: the lock has already served its purpose.
    pub async fn release(&self, lock: &DistributedLock) -> Result<(), LockError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LockError::Internal(e.into()))?;
        let deleted: i64 = deadpool_redis::redis::cmd("EVAL")
            .arg(RELEASE_SCRIPT)
            .arg(1)
            .arg(&lock.key)
            .arg(&lock.token)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Internal(e.into()))?;
        if deleted == 0 {
            warn!(key = %lock.key, "lock already released or reclaimed by lease expiry");
        } else {
            debug!(key = %lock.key, "released distributed lock");
        }
        Ok(())
    }

    /// Scoped acquisition: acquire, run `work`, release on every exit path.
    ///
    /// The release happens whether `work`'s output is success or failure; a
    /// failed release is logged rather than masking the work result. A
    /// holder that dies before releasing is reclaimed by the lease TTL.
    pub async fn with_lock<T, F, Fut>(
        &self,
        key: &str,
        wait: Duration,
        work: F,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.try_acquire(key, wait).await?;
        let out = work().await;
        if let Err(e) = self.release(&lock).await {
            warn!(key, error = %e, "failed to release distributed lock");
        }
        Ok(out)
    }
}
