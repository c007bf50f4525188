/// Commerce service configuration loaded from environment variables.
#[derive(Debug)]
pub struct CommerceConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL (locks, issuance queue, event streams).
    pub redis_url: String,
    /// Wait budget for distributed lock acquisition in milliseconds
    /// (default 3000). Env var: `LOCK_WAIT_MS`.
    pub lock_wait_ms: u64,
    /// Redis list key backing the issuance queue. Env var: `ISSUE_QUEUE_KEY`.
    pub issue_queue_key: String,
    /// Seconds between outbox retry sweeps (default 7). Env var:
    /// `OUTBOX_RETRY_SWEEP_SECS`.
    pub outbox_retry_sweep_secs: u64,
    /// Age in seconds before a PENDING row counts as stale — long enough
    /// that the immediate post-commit publish has already had its chance
    /// (default 7). Env var: `OUTBOX_RETRY_GRACE_SECS`.
    pub outbox_retry_grace_secs: i64,
    /// Maximum rows per retry sweep (default 100). Env var:
    /// `OUTBOX_RETRY_BATCH`.
    pub outbox_retry_batch: u64,
    /// Seconds between retention sweeps (default 86400). Env var:
    /// `OUTBOX_RETENTION_SWEEP_SECS`.
    pub outbox_retention_sweep_secs: u64,
    /// Retention for PUBLISHED outbox rows and consumed-event rows, in days
    /// (default 7). DEAD_LETTER rows are never reaped. Env var:
    /// `OUTBOX_RETENTION_DAYS`.
    pub outbox_retention_days: i64,
    /// Consumer-group name shared by all instances of this service. Env
    /// var: `EVENT_CONSUMER_GROUP`.
    pub event_consumer_group: String,
    /// This instance's consumer name within the group. Env var:
    /// `EVENT_CONSUMER_NAME`.
    pub event_consumer_name: String,
}

impl CommerceConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            redis_url: std::env::var("REDIS_URL").expect("REDIS_URL"),
            lock_wait_ms: parsed_or("LOCK_WAIT_MS", 3000),
            issue_queue_key: string_or("ISSUE_QUEUE_KEY", "coupon:issue:queue"),
            outbox_retry_sweep_secs: parsed_or("OUTBOX_RETRY_SWEEP_SECS", 7),
            outbox_retry_grace_secs: parsed_or("OUTBOX_RETRY_GRACE_SECS", 7),
            outbox_retry_batch: parsed_or("OUTBOX_RETRY_BATCH", 100),
            outbox_retention_sweep_secs: parsed_or("OUTBOX_RETENTION_SWEEP_SECS", 86_400),
            outbox_retention_days: parsed_or("OUTBOX_RETENTION_DAYS", 7),
            event_consumer_group: string_or("EVENT_CONSUMER_GROUP", "commerce"),
            event_consumer_name: string_or("EVENT_CONSUMER_NAME", "commerce-1"),
        }
    }
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn string_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}
