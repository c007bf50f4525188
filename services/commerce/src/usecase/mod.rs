pub mod charge_points;
pub mod complete_order;
pub mod issue_coupon;
pub mod request_issuance;
