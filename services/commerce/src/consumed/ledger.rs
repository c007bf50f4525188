use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::repository::ConsumedEventStore;
use crate::domain::types::ConsumedEvent;
use crate::error::CommerceServiceError;

/// Idempotent-consumption ledger for one consumer.
///
/// Every consumer checks [`Self::has_processed`] before applying side
/// effects and calls [`Self::record_processed`] after. The unique
/// `(event_id, event_type)` constraint underneath is the authoritative
/// guard: when two instances race on the same event, the loser's insert
/// collides and is treated as "already handled", not an error. This turns
/// the broker's at-least-once delivery into at-most-once applied effects.
#[derive(Clone)]
pub struct ConsumedEventLedger<S> {
    store: S,
    consumer_name: String,
}

impl<S: ConsumedEventStore> ConsumedEventLedger<S> {
    pub fn new(store: S, consumer_name: impl Into<String>) -> Self {
        Self {
            store,
            consumer_name: consumer_name.into(),
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    pub async fn has_processed(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, CommerceServiceError> {
        self.store.exists(event_id, event_type).await
    }

    /// Record the handled event. Call only after the side effect's own
    /// transaction has committed.
    pub async fn record_processed(
        &self,
        event_id: &str,
        event_type: &str,
        payload: Option<&str>,
    ) -> Result<(), CommerceServiceError> {
        let record = ConsumedEvent {
            id: Uuid::new_v4(),
            event_id: event_id.to_owned(),
            event_type: event_type.to_owned(),
            processed_at: Utc::now(),
            consumer_name: self.consumer_name.clone(),
            payload: payload.map(|p| p.to_owned()),
        };
        if !self.store.insert(&record).await? {
            warn!(
                event_id,
                event_type, "duplicate consumed-event record, another consumer won the race"
            );
        }
        Ok(())
    }
}
