use std::sync::Arc;

use sea_orm::Database;
use tokio::sync::watch;
use tracing::info;

use maru_commerce::config::CommerceConfig;
use maru_commerce::consumed::ledger::ConsumedEventLedger;
use maru_commerce::domain::types::EVENT_ORDER_COMPLETED;
use maru_commerce::outbox::poller::OutboxPoller;
use maru_commerce::state::AppState;
use maru_commerce::worker::issuance::IssuanceWorker;
use maru_commerce::worker::order_events::{ORDER_COMPLETED_CONSUMER, OrderCompletedConsumer};
use maru_lock::registry::{LockDomain, LockRegistry};

#[tokio::main]
async fn main() {
    maru_core::tracing::init_tracing();

    let config = CommerceConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    // All lock domains are registered here, once. Acquiring against
    // anything else is a programming error that fails fast.
    let registry = Arc::new(LockRegistry::new(&[
        LockDomain::User,
        LockDomain::Coupon,
        LockDomain::ProductOption,
        LockDomain::Order,
    ]));

    let state = AppState {
        db,
        redis,
        registry,
        config: Arc::new(config),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The single issuance queue drainer.
    let worker = IssuanceWorker::new(
        state.issuance_queue(),
        state.coupon_store(),
        state.outbox_service(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    // Outbox retry + retention sweeps.
    let poller = OutboxPoller::new(
        state.outbox_service(),
        state.outbox_store(),
        state.consumed_event_store(),
        &state.config,
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));

    // Downstream consumer with ledger-backed dedup.
    let ledger = ConsumedEventLedger::new(state.consumed_event_store(), ORDER_COMPLETED_CONSUMER);
    let consumer = OrderCompletedConsumer::new(ledger);
    let source = state.event_consumer(EVENT_ORDER_COMPLETED);
    let consumer_handle = tokio::spawn(consumer.run(source, shutdown_rx));

    info!("commerce coordination service started");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    info!("shutdown signal received, draining workers");
    let _ = shutdown_tx.send(true);

    let _ = worker_handle.await;
    let _ = poller_handle.await;
    let _ = consumer_handle.await;
    info!("commerce coordination service stopped");
}
