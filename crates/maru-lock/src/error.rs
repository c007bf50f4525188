use crate::registry::LockDomain;

/// Lock layer error variants.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to acquire lock {key} within {wait_ms}ms")]
    AcquisitionTimeout { key: String, wait_ms: u64 },
    #[error("lock domain {0:?} was not registered at startup")]
    UnknownDomain(LockDomain),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl LockError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AcquisitionTimeout { .. } => "LOCK_ACQUISITION_FAILED",
            Self::UnknownDomain(_) => "UNKNOWN_LOCK_DOMAIN",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// True for the timeout variant callers may retry or surface as "busy".
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::AcquisitionTimeout { .. })
    }
}
