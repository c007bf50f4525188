use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context as _;
use deadpool_redis::Pool;
use tracing::debug;

use crate::domain::repository::MessagePublisher;
use crate::domain::types::PublishReceipt;
use crate::error::CommerceServiceError;

/// Message publisher on Redis Streams: one stream per event type, entries
/// carry the routing key and the JSON payload. Entries within a stream are
/// totally ordered, and consumer groups give each group one delivery per
/// entry — the broker contract the outbox pipeline needs.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    pool: Pool,
}

impl RedisStreamPublisher {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl MessagePublisher for RedisStreamPublisher {
    async fn publish(
        &self,
        event_type: &str,
        key: &str,
        payload: &str,
    ) -> Result<PublishReceipt, anyhow::Error> {
        let mut conn = self.pool.get().await.context("get redis connection")?;
        let entry_id: String = deadpool_redis::redis::cmd("XADD")
            .arg(event_type)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("XADD to stream {event_type}"))?;
        debug!(stream = event_type, key, entry_id = %entry_id, "message published");
        Ok(PublishReceipt {
            message_id: entry_id,
        })
    }
}

/// One entry read from a stream via a consumer group.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub key: String,
    pub payload: String,
}

/// Consumer-group reader for one stream. Every instance of a service shares
/// the group; each entry is delivered to exactly one consumer in it and
/// redelivered until acknowledged.
pub struct RedisStreamConsumer {
    pool: Pool,
    stream: String,
    group: String,
    consumer: String,
}

impl RedisStreamConsumer {
    pub fn new(
        pool: Pool,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
        }
    }

    /// Create the group (and the stream, via MKSTREAM) if missing. An
    /// already-existing group is fine.
    pub async fn ensure_group(&self) -> Result<(), CommerceServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        let created: Result<String, deadpool_redis::redis::RedisError> =
            deadpool_redis::redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&self.stream)
                .arg(&self.group)
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;
        match created {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(CommerceServiceError::Internal(e.into())),
        }
    }

    /// Block up to `timeout` for the next batch of undelivered entries.
    pub async fn read(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<StreamEntry>, CommerceServiceError> {
        type Reply = Option<Vec<(String, Vec<(String, HashMap<String, String>)>)>>;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        let reply: Reply = deadpool_redis::redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(timeout.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;

        let mut entries = Vec::new();
        if let Some(streams) = reply {
            for (_stream, items) in streams {
                for (id, mut fields) in items {
                    entries.push(StreamEntry {
                        id,
                        key: fields.remove("key").unwrap_or_default(),
                        payload: fields.remove("payload").unwrap_or_default(),
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Acknowledge one processed entry so the group stops redelivering it.
    pub async fn ack(&self, entry_id: &str) -> Result<(), CommerceServiceError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        let _acked: i64 = deadpool_redis::redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(entry_id)
            .query_async(&mut conn)
            .await
            .map_err(|e| CommerceServiceError::Internal(e.into()))?;
        Ok(())
    }
}
