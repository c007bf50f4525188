use tracing::info;

use crate::domain::repository::IssuanceQueue;
use crate::domain::types::IssuanceRequest;
use crate::error::CommerceServiceError;

/// Producer side of the issuance queue.
///
/// Appends the request to the durable FIFO and acknowledges *acceptance* —
/// the outcome is decided later by the single queue consumer, in arrival
/// order, and callers observe it through the grant state. This path never
/// contends on the coupon counter.
pub struct RequestIssuanceUseCase<Q: IssuanceQueue> {
    pub queue: Q,
}

impl<Q: IssuanceQueue> RequestIssuanceUseCase<Q> {
    pub async fn execute(&self, input: IssuanceRequest) -> Result<(), CommerceServiceError> {
        self.queue.enqueue(&input).await?;
        info!(
            coupon_id = input.coupon_id,
            user_id = input.user_id,
            "issuance request accepted"
        );
        Ok(())
    }
}
