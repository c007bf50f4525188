use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommerceServiceError;

/// Aggregate type tags recorded on outbox rows.
pub const AGGREGATE_COUPON: &str = "COUPON";
pub const AGGREGATE_ORDER: &str = "ORDER";

/// Event types; also the broker stream/topic names.
pub const EVENT_COUPON_ISSUED: &str = "CouponIssued";
pub const EVENT_ORDER_COMPLETED: &str = "OrderCompleted";

/// Default publish retry budget before a row is dead-lettered.
pub const DEFAULT_MAX_RETRY: i32 = 3;

// ── Coupons ──────────────────────────────────────────────────────────────────

/// Limited-supply coupon. The issued counter is the contended resource: it
/// is only ever written inside `CouponStore::issue`.
#[derive(Debug, Clone)]
pub struct Coupon {
    pub id: i64,
    pub coupon_name: String,
    pub total_quantity: i32,
    pub issued_quantity: i32,
    pub limit_per_user: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Validity window and remaining-supply check.
    pub fn validate_issuable(&self, now: DateTime<Utc>) -> Result<(), CommerceServiceError> {
        if now < self.valid_from || now > self.valid_until {
            return Err(CommerceServiceError::CouponOutsideWindow {
                coupon_id: self.id,
            });
        }
        if self.issued_quantity >= self.total_quantity {
            return Err(CommerceServiceError::CouponSoldOut {
                coupon_id: self.id,
            });
        }
        Ok(())
    }

    pub fn increase_issued_quantity(&mut self) {
        self.issued_quantity += 1;
    }
}

/// A coupon grant issued to one user.
#[derive(Debug, Clone)]
pub struct UserCoupon {
    pub id: Uuid,
    pub coupon_id: i64,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Immutable request placed on the issuance queue. Created by a producer
/// call, consumed exactly once by the single drainer, then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    pub coupon_id: i64,
    pub user_id: i64,
}

// ── Outbox ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Published,
    DeadLetter,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::DeadLetter => "DEAD_LETTER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PUBLISHED" => Some(Self::Published),
            "DEAD_LETTER" => Some(Self::DeadLetter),
            _ => None,
        }
    }
}

/// Fields for a new outbox row. Only ever inserted inside the same
/// transaction as the domain mutation it announces.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
}

/// One outbox row.
///
/// Status transitions are monotonic forward: PENDING may move to PUBLISHED
/// or DEAD_LETTER, both of which are terminal. All transitions go through
/// [`Self::mark_published`] and [`Self::register_failure`].
#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub max_retry: i32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl OutboxEvent {
    pub fn from_new(new_event: &NewOutboxEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_type: new_event.aggregate_type.clone(),
            aggregate_id: new_event.aggregate_id.clone(),
            event_type: new_event.event_type.clone(),
            payload: new_event.payload.clone(),
            status: OutboxStatus::Pending,
            retry_count: 0,
            max_retry: DEFAULT_MAX_RETRY,
            created_at: now,
            published_at: None,
            last_retry_at: None,
            error_message: None,
        }
    }

    /// PENDING → PUBLISHED. Terminal states are left untouched.
    pub fn mark_published(&mut self, now: DateTime<Utc>) {
        if self.status != OutboxStatus::Pending {
            return;
        }
        self.status = OutboxStatus::Published;
        self.published_at = Some(now);
    }

    /// Record a publish failure: bump the retry counter, keep the row
    /// PENDING while budget remains, dead-letter it once `retry_count`
    /// reaches `max_retry`. Returns the resulting status.
    pub fn register_failure(&mut self, error: &str, now: DateTime<Utc>) -> OutboxStatus {
        if self.status != OutboxStatus::Pending {
            return self.status;
        }
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.error_message = Some(error.to_owned());
        if self.retry_count >= self.max_retry {
            self.status = OutboxStatus::DeadLetter;
        }
        self.status
    }
}

// ── Consumed events ──────────────────────────────────────────────────────────

/// One ledger row: proof that `consumer_name` already handled
/// `(event_id, event_type)`. Never updated after insert.
#[derive(Debug, Clone)]
pub struct ConsumedEvent {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub consumer_name: String,
    pub payload: Option<String>,
}

// ── Event payloads ───────────────────────────────────────────────────────────

/// Payload of a `CouponIssued` outbox event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponIssuedEvent {
    pub coupon_id: i64,
    pub user_id: i64,
    pub user_coupon_id: Uuid,
}

/// Payload of an `OrderCompleted` outbox event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order_id: Uuid,
    pub user_id: i64,
    pub total_amount: i64,
}

/// Broker acknowledgment for one published message.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub message_id: String,
}
