pub mod consumed_event_logs;
pub mod coupons;
pub mod orders;
pub mod outbox_events;
pub mod user_coupons;
pub mod user_points;
