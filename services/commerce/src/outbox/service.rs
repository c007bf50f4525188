use tracing::{error, info, warn};

use crate::domain::repository::{MessagePublisher, OutboxStore};
use crate::domain::types::{OutboxEvent, OutboxStatus};

/// Publishes outbox rows and keeps their status in step with the outcome.
///
/// Broker-independent: the actual send goes through the [`MessagePublisher`]
/// port, keyed by the aggregate id so same-aggregate events stay ordered.
/// Status bookkeeping runs in its own transaction, independent of the
/// domain transaction that created the row.
#[derive(Clone)]
pub struct OutboxService<S, P> {
    store: S,
    publisher: P,
}

impl<S, P> OutboxService<S, P>
where
    S: OutboxStore,
    P: MessagePublisher,
{
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    /// Publish one PENDING row. Invoked as the explicit post-commit hook by
    /// the transaction-owning code path, and again by the poller for rows
    /// whose immediate attempt failed or never ran.
    ///
    /// Outcomes are recorded, never propagated: in the post-commit path
    /// there is no caller left to hand an error to. Success moves the row
    /// to PUBLISHED; failure burns one retry and either leaves it PENDING
    /// for the poller or dead-letters it once the budget is gone.
    pub async fn publish_event(&self, event: &OutboxEvent) {
        if event.status != OutboxStatus::Pending {
            warn!(
                outbox_id = %event.id,
                status = event.status.as_str(),
                "skipping non-pending outbox event"
            );
            return;
        }
        match self
            .publisher
            .publish(&event.event_type, &event.aggregate_id, &event.payload)
            .await
        {
            Ok(receipt) => match self.store.mark_published(event.id).await {
                Ok(()) => info!(
                    outbox_id = %event.id,
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    message_id = %receipt.message_id,
                    "outbox event published"
                ),
                Err(e) => error!(
                    outbox_id = %event.id,
                    error = %e,
                    "failed to mark outbox event published"
                ),
            },
            Err(publish_err) => {
                match self
                    .store
                    .record_failure(event.id, &publish_err.to_string())
                    .await
                {
                    Ok(OutboxStatus::DeadLetter) => error!(
                        outbox_id = %event.id,
                        event_type = %event.event_type,
                        error = %publish_err,
                        "publish failed permanently, event dead-lettered"
                    ),
                    Ok(_) => warn!(
                        outbox_id = %event.id,
                        event_type = %event.event_type,
                        error = %publish_err,
                        "publish failed, poller will retry"
                    ),
                    Err(e) => error!(
                        outbox_id = %event.id,
                        error = %e,
                        "failed to record publish failure"
                    ),
                }
            }
        }
    }
}
