use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::CommerceConfig;
use crate::domain::repository::{ConsumedEventStore, MessagePublisher, OutboxStore};
use crate::outbox::service::OutboxService;

/// Timer-driven backstop for the outbox pipeline.
///
/// Two independent duties: re-publish PENDING rows whose immediate
/// post-commit attempt failed (or never ran), and reap old PUBLISHED rows
/// plus aged ledger rows. Multiple poller instances may run concurrently —
/// the retry sweep's skip-locked read keeps them off each other's rows, and
/// the grace window keeps the sweep clear of rows the immediate publish is
/// still working on. DEAD_LETTER rows are invisible to both duties.
pub struct OutboxPoller<S, P, L> {
    service: OutboxService<S, P>,
    store: S,
    ledger: L,
    retry_interval: Duration,
    grace: chrono::Duration,
    batch: u64,
    retention_interval: Duration,
    retention: chrono::Duration,
}

impl<S, P, L> OutboxPoller<S, P, L>
where
    S: OutboxStore + Clone,
    P: MessagePublisher,
    L: ConsumedEventStore,
{
    pub fn new(
        service: OutboxService<S, P>,
        store: S,
        ledger: L,
        config: &CommerceConfig,
    ) -> Self {
        Self {
            service,
            store,
            ledger,
            retry_interval: Duration::from_secs(config.outbox_retry_sweep_secs),
            grace: chrono::Duration::seconds(config.outbox_retry_grace_secs),
            batch: config.outbox_retry_batch,
            retention_interval: Duration::from_secs(config.outbox_retention_sweep_secs),
            retention: chrono::Duration::days(config.outbox_retention_days),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut retry_tick = tokio::time::interval(self.retry_interval);
        let mut retention_tick = tokio::time::interval(self.retention_interval);
        info!("outbox poller started");
        loop {
            tokio::select! {
                _ = retry_tick.tick() => self.retry_sweep().await,
                _ = retention_tick.tick() => self.retention_sweep().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("outbox poller stopped");
    }

    /// Re-publish PENDING rows older than the grace window, oldest first.
    pub async fn retry_sweep(&self) {
        let threshold = Utc::now() - self.grace;
        let events = match self.store.fetch_pending_for_retry(threshold, self.batch).await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "outbox retry sweep query failed");
                return;
            }
        };
        if events.is_empty() {
            return;
        }
        info!(count = events.len(), "re-publishing stale pending outbox events");
        for event in &events {
            self.service.publish_event(event).await;
        }
    }

    /// Delete PUBLISHED rows and ledger rows past retention. DEAD_LETTER
    /// rows are kept for manual replay.
    pub async fn retention_sweep(&self) {
        let threshold = Utc::now() - self.retention;
        match self.store.delete_published_before(threshold).await {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "removed old published outbox events"),
            Err(e) => error!(error = %e, "outbox retention sweep failed"),
        }
        match self.ledger.delete_older_than(threshold).await {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "removed old consumed-event records"),
            Err(e) => error!(error = %e, "consumed-event retention sweep failed"),
        }
    }
}
