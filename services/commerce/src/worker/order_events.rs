use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::consumed::ledger::ConsumedEventLedger;
use crate::domain::repository::ConsumedEventStore;
use crate::domain::types::{EVENT_ORDER_COMPLETED, OrderCompletedEvent};
use crate::error::CommerceServiceError;
use crate::infra::broker::RedisStreamConsumer;

/// Consumer name recorded on ledger rows written by this worker.
pub const ORDER_COMPLETED_CONSUMER: &str = "order-completed-consumer";

const READ_COUNT: usize = 10;

/// Downstream consumer of `OrderCompleted` events.
///
/// The broker redelivers until an entry is acknowledged, so every delivery
/// goes through the ledger: check before the side effect, record after.
/// Redelivered or racing duplicates collapse into a single applied effect.
pub struct OrderCompletedConsumer<S> {
    ledger: ConsumedEventLedger<S>,
    poll_timeout: Duration,
}

impl<S: ConsumedEventStore> OrderCompletedConsumer<S> {
    pub fn new(ledger: ConsumedEventLedger<S>) -> Self {
        Self {
            ledger,
            poll_timeout: Duration::from_secs(1),
        }
    }

    pub async fn run(self, source: RedisStreamConsumer, shutdown: watch::Receiver<bool>) {
        // The group must exist before the first read; retry until it does
        // (Redis may still be coming up) or shutdown is requested.
        while let Err(e) = source.ensure_group().await {
            error!(error = %e, "failed to create consumer group, retrying");
            tokio::time::sleep(self.poll_timeout).await;
            if *shutdown.borrow() {
                return;
            }
        }
        info!("order-completed consumer started");
        while !*shutdown.borrow() {
            let entries = match source.read(READ_COUNT, self.poll_timeout).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!(error = %e, "failed to read event stream");
                    tokio::time::sleep(self.poll_timeout).await;
                    continue;
                }
            };
            for entry in entries {
                match self.handle(&entry.payload).await {
                    // Applied, duplicate, or poison — all acknowledged so
                    // the group stops redelivering the entry.
                    Ok(_) => {
                        if let Err(e) = source.ack(&entry.id).await {
                            error!(entry_id = %entry.id, error = %e, "failed to ack stream entry");
                        }
                    }
                    // Transient failure: leave unacked for redelivery.
                    Err(e) => {
                        error!(entry_id = %entry.id, error = %e, "event left for redelivery");
                    }
                }
            }
        }
        info!("order-completed consumer stopped");
    }

    /// Handle one delivery. `Ok(true)` means the side effect was applied
    /// (first delivery); `Ok(false)` covers duplicates and malformed
    /// payloads, which are dropped; `Err` is a transient store failure and
    /// the entry should be redelivered.
    pub async fn handle(&self, payload: &str) -> Result<bool, CommerceServiceError> {
        let event: OrderCompletedEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, payload, "malformed OrderCompleted payload, dropping");
                return Ok(false);
            }
        };
        let event_id = event.order_id.to_string();

        if self
            .ledger
            .has_processed(&event_id, EVENT_ORDER_COMPLETED)
            .await?
        {
            warn!(event_id = %event_id, "OrderCompleted already processed, skipping");
            return Ok(false);
        }

        // The side effect: fold the completed order into sales statistics.
        info!(
            order_id = %event.order_id,
            user_id = event.user_id,
            total_amount = event.total_amount,
            consumer = self.ledger.consumer_name(),
            "order completion applied"
        );

        self.ledger
            .record_processed(&event_id, EVENT_ORDER_COMPLETED, Some(payload))
            .await?;
        Ok(true)
    }
}
