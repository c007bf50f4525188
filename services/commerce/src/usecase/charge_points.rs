use std::sync::Arc;

use tracing::info;

use maru_lock::registry::{LockDomain, LockRegistry};

use crate::domain::repository::PointStore;
use crate::error::CommerceServiceError;

/// Point charge under the in-process keyed mutex.
///
/// The fallback path for single-instance deployments: the registry mutex
/// for `(User, user_id)` serializes the read-modify-write of the balance
/// within this process, without an external lock store. An unregistered
/// domain here is a programming error and fails the call outright.
pub struct ChargePointsUseCase<P: PointStore> {
    pub points: P,
    pub registry: Arc<LockRegistry>,
}

impl<P: PointStore> ChargePointsUseCase<P> {
    pub async fn execute(&self, user_id: i64, amount: i64) -> Result<i64, CommerceServiceError> {
        if amount <= 0 {
            return Err(CommerceServiceError::PointChargeNotPositive { amount });
        }

        let mutex = self.registry.acquire(LockDomain::User, user_id)?;
        let _guard = mutex.lock().await;
        let balance = self.points.charge(user_id, amount).await?;
        info!(user_id, amount, balance, "points charged");
        Ok(balance)
    }
}
