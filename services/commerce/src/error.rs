use maru_lock::error::LockError;

/// Commerce service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum CommerceServiceError {
    #[error("coupon not found: {coupon_id}")]
    CouponNotFound { coupon_id: i64 },
    #[error("coupon {coupon_id} is outside its validity window")]
    CouponOutsideWindow { coupon_id: i64 },
    #[error("coupon {coupon_id} has no remaining supply")]
    CouponSoldOut { coupon_id: i64 },
    #[error("per-user issuance limit reached for coupon {coupon_id}")]
    CouponLimitPerUser { coupon_id: i64 },
    #[error("order not found: {order_id}")]
    OrderNotFound { order_id: uuid::Uuid },
    #[error("point charge amount must be positive, got {amount}")]
    PointChargeNotPositive { amount: i64 },
    #[error("resource busy, retry")]
    ResourceBusy,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl CommerceServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CouponNotFound { .. } => "COUPON_NOT_FOUND",
            Self::CouponOutsideWindow { .. } => "COUPON_OUTSIDE_WINDOW",
            Self::CouponSoldOut { .. } => "COUPON_SOLD_OUT",
            Self::CouponLimitPerUser { .. } => "COUPON_LIMIT_PER_USER",
            Self::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            Self::PointChargeNotPositive { .. } => "POINT_CHARGE_NOT_POSITIVE",
            Self::ResourceBusy => "RESOURCE_BUSY",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Issuance business-rule violations: logged per item by the queue
    /// consumer, never allowed to stop the worker loop.
    pub fn is_issuance_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::CouponNotFound { .. }
                | Self::CouponOutsideWindow { .. }
                | Self::CouponSoldOut { .. }
                | Self::CouponLimitPerUser { .. }
        )
    }
}

impl From<LockError> for CommerceServiceError {
    fn from(err: LockError) -> Self {
        match err {
            // Lock contention is a user-visible "busy, try again", not a fault.
            LockError::AcquisitionTimeout { .. } => Self::ResourceBusy,
            other => Self::Internal(other.into()),
        }
    }
}
