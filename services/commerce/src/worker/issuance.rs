use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::domain::repository::{CouponStore, IssuanceQueue, MessagePublisher, OutboxStore};
use crate::domain::types::IssuanceRequest;
use crate::outbox::service::OutboxService;

/// The single dedicated consumer of the issuance queue.
///
/// Exactly one worker drains the queue, so the check-then-increment inside
/// `CouponStore::issue` is serialized by ordering rather than locking: many
/// producers enqueue concurrently, but only this loop ever touches the
/// issued counter for queued coupons. The queue trades request-time latency
/// for that total order — producers learn about acceptance, not outcome.
pub struct IssuanceWorker<Q, C, S, P> {
    queue: Q,
    coupons: C,
    outbox: OutboxService<S, P>,
    poll_timeout: Duration,
}

impl<Q, C, S, P> IssuanceWorker<Q, C, S, P>
where
    Q: IssuanceQueue,
    C: CouponStore,
    S: OutboxStore,
    P: MessagePublisher,
{
    pub fn new(queue: Q, coupons: C, outbox: OutboxService<S, P>) -> Self {
        Self {
            queue,
            coupons,
            outbox,
            poll_timeout: Duration::from_secs(1),
        }
    }

    /// Shorten the blocking-pop timeout (tests drain faster).
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Drain the queue until shutdown flips. The blocking pop wakes at
    /// least every `poll_timeout` so the signal is observed between items;
    /// an item already being processed always finishes first.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!("coupon issuance worker started");
        while !*shutdown.borrow() {
            match self.queue.dequeue(self.poll_timeout).await {
                Ok(Some(request)) => self.process(&request).await,
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "failed to read issuance queue");
                    tokio::time::sleep(self.poll_timeout).await;
                }
            }
        }
        info!("coupon issuance worker stopped");
    }

    /// Process one request. Business-rule rejections are logged per item
    /// and swallowed — one bad request must never stall or crash the loop.
    async fn process(&self, request: &IssuanceRequest) {
        match self.coupons.issue(request).await {
            Ok((grant, event)) => {
                info!(
                    coupon_id = request.coupon_id,
                    user_id = request.user_id,
                    user_coupon_id = %grant.id,
                    "coupon issued"
                );
                // Post-commit hook: the grant transaction is committed, now
                // hand the event to the broker. The poller covers failures.
                self.outbox.publish_event(&event).await;
            }
            Err(e) if e.is_issuance_rule_violation() => {
                warn!(
                    coupon_id = request.coupon_id,
                    user_id = request.user_id,
                    kind = e.kind(),
                    error = %e,
                    "issuance request rejected"
                );
            }
            Err(e) => {
                error!(
                    coupon_id = request.coupon_id,
                    user_id = request.user_id,
                    error = %e,
                    "issuance request failed"
                );
            }
        }
    }
}
