#![allow(async_fn_in_trait)]

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use maru_lock::error::LockError;

use crate::domain::types::{
    ConsumedEvent, IssuanceRequest, NewOutboxEvent, OutboxEvent, OutboxStatus, PublishReceipt,
    UserCoupon,
};
use crate::error::CommerceServiceError;

/// Store for coupons and their grants.
pub trait CouponStore: Send + Sync {
    /// Run the full issuance rule in one transaction: load the coupon,
    /// check the per-user limit, the validity window and the remaining
    /// supply, then increment the issued count, insert the grant row and
    /// the `CouponIssued` outbox row. All-or-nothing.
    ///
    /// This is the only writer of the issued counter. Callers must
    /// serialize invocations per coupon — the single queue consumer does it
    /// by ordering, the synchronous path by a coupon-keyed distributed lock.
    async fn issue(
        &self,
        request: &IssuanceRequest,
    ) -> Result<(UserCoupon, OutboxEvent), CommerceServiceError>;
}

/// Store for orders.
pub trait OrderStore: Send + Sync {
    /// Mark the order completed and insert its outbox row in the same
    /// transaction, so a committed completion always has a pending event
    /// and a rolled-back one never does.
    async fn complete_with_outbox(
        &self,
        order_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<OutboxEvent, CommerceServiceError>;
}

/// Store for user point balances.
pub trait PointStore: Send + Sync {
    /// Add `amount` to the balance (creating the row on first charge) and
    /// return the new balance. Callers hold the user's keyed mutex around
    /// this read-modify-write.
    async fn charge(&self, user_id: i64, amount: i64) -> Result<i64, CommerceServiceError>;
}

/// Store for outbox rows. Rows are born only inside the domain stores'
/// `*_with_outbox` transactions; this port only does status bookkeeping and
/// the poller sweeps.
pub trait OutboxStore: Send + Sync {
    /// PENDING → PUBLISHED in its own transaction.
    async fn mark_published(&self, id: Uuid) -> Result<(), CommerceServiceError>;

    /// Increment the retry counter, record the error, and dead-letter the
    /// row once the budget is exhausted. Returns the resulting status.
    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<OutboxStatus, CommerceServiceError>;

    /// PENDING rows older than `older_than`, oldest first, skipping rows
    /// currently locked by a concurrent sweep. Never returns terminal rows.
    async fn fetch_pending_for_retry(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OutboxEvent>, CommerceServiceError>;

    /// Retention sweep: delete PUBLISHED rows older than `threshold`.
    /// Returns the number of rows removed. DEAD_LETTER rows are never
    /// deleted here.
    async fn delete_published_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<u64, CommerceServiceError>;
}

/// Durable dedup ledger consulted by every downstream consumer.
pub trait ConsumedEventStore: Send + Sync {
    async fn exists(&self, event_id: &str, event_type: &str)
    -> Result<bool, CommerceServiceError>;

    /// Insert the ledger row. Returns `false` when the unique
    /// `(event_id, event_type)` constraint fired — another instance already
    /// handled the event.
    async fn insert(&self, record: &ConsumedEvent) -> Result<bool, CommerceServiceError>;

    /// Age-based retention. Returns the number of rows removed.
    async fn delete_older_than(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<u64, CommerceServiceError>;
}

/// Broker-independent publisher port. `key` is the partition/routing key —
/// the aggregate id — so events of one aggregate stay ordered.
pub trait MessagePublisher: Send + Sync {
    async fn publish(
        &self,
        event_type: &str,
        key: &str,
        payload: &str,
    ) -> Result<PublishReceipt, anyhow::Error>;
}

/// Durable FIFO carrying issuance requests to the single consumer.
pub trait IssuanceQueue: Send + Sync {
    /// Append and return immediately. Never blocks on downstream
    /// processing and never rejects — the list itself is the buffer.
    async fn enqueue(&self, request: &IssuanceRequest) -> Result<(), CommerceServiceError>;

    /// Block up to `timeout` for the next request; `None` on an empty
    /// queue so the caller can observe shutdown between items.
    async fn dequeue(
        &self,
        timeout: Duration,
    ) -> Result<Option<IssuanceRequest>, CommerceServiceError>;
}

/// Scoped distributed-lock port used by the synchronous write paths. The
/// wait budget is implementation configuration; acquisition failure is a
/// typed timeout the caller maps to a user-visible "busy".
pub trait LockPort: Send + Sync {
    async fn with_lock<T, F, Fut>(&self, key: &str, work: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>;

    /// All-or-nothing acquisition of the (deduplicated, globally ordered)
    /// key set around `work`.
    async fn with_locks<T, F, Fut>(&self, keys: &[String], work: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>;
}
