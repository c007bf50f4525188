use maru_lock::distributed::lock_key;
use maru_lock::registry::LockDomain;

use crate::domain::repository::{CouponStore, LockPort, MessagePublisher, OutboxStore};
use crate::domain::types::{IssuanceRequest, UserCoupon};
use crate::error::CommerceServiceError;
use crate::outbox::service::OutboxService;

/// Synchronous issuance path: a coupon-keyed distributed lock around the
/// issuance transaction.
///
/// The scoped wrapper releases on every exit path, and only after the
/// transaction inside has committed — releasing earlier would re-open the
/// race on the issued counter. A lock timeout surfaces as `ResourceBusy`
/// ("try again"); callers who would rather not contend at all use the
/// queue path instead.
pub struct IssueCouponUseCase<L, C, S, P> {
    pub locks: L,
    pub coupons: C,
    pub outbox: OutboxService<S, P>,
}

impl<L, C, S, P> IssueCouponUseCase<L, C, S, P>
where
    L: LockPort,
    C: CouponStore,
    S: OutboxStore,
    P: MessagePublisher,
{
    pub async fn execute(
        &self,
        input: IssuanceRequest,
    ) -> Result<UserCoupon, CommerceServiceError> {
        let key = lock_key(LockDomain::Coupon.as_str(), input.coupon_id);
        let outcome = self
            .locks
            .with_lock(&key, || self.coupons.issue(&input))
            .await?;
        let (grant, event) = outcome?;

        // Post-commit hook: the grant is durable, announce it.
        self.outbox.publish_event(&event).await;
        Ok(grant)
    }
}
