use std::time::Duration;

use anyhow::Context as _;
use deadpool_redis::Pool;
use tracing::info;

use crate::domain::repository::IssuanceQueue;
use crate::domain::types::IssuanceRequest;
use crate::error::CommerceServiceError;

/// Durable FIFO on a Redis list. Producers RPUSH and return immediately;
/// the single consumer BLPOPs. The list survives process restarts, so
/// accepted requests are never lost to a redeploy.
#[derive(Clone)]
pub struct RedisIssuanceQueue {
    pool: Pool,
    key: String,
}

impl RedisIssuanceQueue {
    pub fn new(pool: Pool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }
}

impl IssuanceQueue for RedisIssuanceQueue {
    async fn enqueue(&self, request: &IssuanceRequest) -> Result<(), CommerceServiceError> {
        let payload = serde_json::to_string(request).context("serialize issuance request")?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        let _len: i64 = deadpool_redis::redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        info!(
            coupon_id = request.coupon_id,
            user_id = request.user_id,
            "issuance request enqueued"
        );
        Ok(())
    }

    async fn dequeue(
        &self,
        timeout: Duration,
    ) -> Result<Option<IssuanceRequest>, CommerceServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        // BLPOP returns (list, element), or nil once the timeout elapses.
        let reply: Option<(String, String)> = deadpool_redis::redis::cmd("BLPOP")
            .arg(&self.key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        match reply {
            None => Ok(None),
            Some((_, payload)) => {
                let request =
                    serde_json::from_str(&payload).context("deserialize issuance request")?;
                Ok(Some(request))
            }
        }
    }
}
