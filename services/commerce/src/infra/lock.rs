use std::future::Future;
use std::time::Duration;

use deadpool_redis::Pool;

use maru_lock::distributed::DistributedLockCoordinator;
use maru_lock::error::LockError;
use maru_lock::multi::MultiLockExecutor;

use crate::domain::repository::LockPort;

/// Redis-backed implementation of the lock port: a single coordinator for
/// one-key critical sections and a multi-lock executor on top of it, both
/// sharing one configured wait budget.
#[derive(Clone)]
pub struct RedisLockExecutor {
    coordinator: DistributedLockCoordinator,
    multi: MultiLockExecutor,
    wait: Duration,
}

impl RedisLockExecutor {
    pub fn new(pool: Pool, wait: Duration) -> Self {
        let coordinator = DistributedLockCoordinator::new(pool);
        let multi = MultiLockExecutor::new(coordinator.clone());
        Self {
            coordinator,
            multi,
            wait,
        }
    }
}

impl LockPort for RedisLockExecutor {
    async fn with_lock<T, F, Fut>(&self, key: &str, work: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.coordinator.with_lock(key, self.wait, work).await
    }

    async fn with_locks<T, F, Fut>(&self, keys: &[String], work: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.multi.with_locks(keys, self.wait, work).await
    }
}
