use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use maru_commerce::domain::repository::IssuanceQueue;
use maru_commerce::domain::types::{IssuanceRequest, OutboxStatus};
use maru_commerce::outbox::service::OutboxService;
use maru_commerce::worker::issuance::IssuanceWorker;

use crate::helpers::{
    MockCouponStore, MockIssuanceQueue, MockOutboxStore, MockPublisher, test_coupon, wait_until,
};

const POLL: Duration = Duration::from_millis(10);

struct Harness {
    queue: MockIssuanceQueue,
    coupons: MockCouponStore,
    outbox: MockOutboxStore,
    publisher: MockPublisher,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

/// Spawn the single drainer against in-memory stores.
fn start_worker(coupons: Vec<maru_commerce::domain::types::Coupon>) -> Harness {
    let queue = MockIssuanceQueue::empty();
    let outbox = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let store = MockCouponStore::with_coupons(coupons, outbox.clone());
    let worker = IssuanceWorker::new(
        queue.clone(),
        store.clone(),
        OutboxService::new(outbox.clone(), publisher.clone()),
    )
    .with_poll_timeout(POLL);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));
    Harness {
        queue,
        coupons: store,
        outbox,
        publisher,
        shutdown: shutdown_tx,
        worker: handle,
    }
}

async fn stop_worker(harness: Harness) {
    harness.shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), harness.worker)
        .await
        .expect("worker did not stop after shutdown signal")
        .unwrap();
}

#[tokio::test]
async fn should_drain_requests_in_enqueue_order_up_to_supply() {
    let harness = start_worker(vec![test_coupon(7, 3, 1)]);

    for user_id in 1..=5 {
        harness
            .queue
            .enqueue(&IssuanceRequest {
                coupon_id: 7,
                user_id,
            })
            .await
            .unwrap();
    }

    let drained = wait_until(|| harness.queue.len() == 0 && harness.coupons.issued().len() == 3)
        .await;
    assert!(drained, "worker did not drain the queue");

    // Exactly the supply was granted, strictly in arrival order.
    let issued = harness.coupons.issued();
    assert_eq!(issued.len(), 3);
    let winners: Vec<i64> = issued.iter().map(|g| g.user_id).collect();
    assert_eq!(winners, vec![1, 2, 3]);
    assert_eq!(harness.coupons.coupon(7).unwrap().issued_quantity, 3);

    // Every grant got its outbox event published post-commit.
    let published = wait_until(|| {
        harness
            .outbox
            .rows()
            .iter()
            .all(|e| e.status == OutboxStatus::Published)
    })
    .await;
    assert!(published, "grant events were not all published");
    assert_eq!(harness.outbox.rows().len(), 3);
    assert_eq!(harness.publisher.published().len(), 3);

    stop_worker(harness).await;
}

#[tokio::test]
async fn should_grant_exactly_one_when_two_users_race_for_last_unit() {
    // supply=1, limitPerUser=1, two different users: one grant, one
    // sold-out rejection — and the rejection must not stop the worker.
    let harness = start_worker(vec![test_coupon(7, 1, 1)]);

    for user_id in [1, 2] {
        harness
            .queue
            .enqueue(&IssuanceRequest {
                coupon_id: 7,
                user_id,
            })
            .await
            .unwrap();
    }

    let drained = wait_until(|| harness.queue.len() == 0).await;
    assert!(drained);
    let settled = wait_until(|| harness.coupons.issued().len() == 1).await;
    assert!(settled);

    let issued = harness.coupons.issued();
    assert_eq!(issued.len(), 1, "only the first request may win");
    assert_eq!(issued[0].user_id, 1);
    assert_eq!(harness.coupons.coupon(7).unwrap().issued_quantity, 1);

    // The loop survived the violation: it still answers the shutdown signal.
    stop_worker(harness).await;
}

#[tokio::test]
async fn should_enforce_per_user_limit_across_repeated_requests() {
    let harness = start_worker(vec![test_coupon(7, 10, 1)]);

    for _ in 0..3 {
        harness
            .queue
            .enqueue(&IssuanceRequest {
                coupon_id: 7,
                user_id: 42,
            })
            .await
            .unwrap();
    }

    let drained = wait_until(|| harness.queue.len() == 0).await;
    assert!(drained);

    assert_eq!(harness.coupons.issued().len(), 1);
    assert_eq!(harness.coupons.coupon(7).unwrap().issued_quantity, 1);

    stop_worker(harness).await;
}

#[tokio::test]
async fn should_skip_unknown_coupon_and_keep_draining() {
    let harness = start_worker(vec![test_coupon(7, 1, 1)]);

    harness
        .queue
        .enqueue(&IssuanceRequest {
            coupon_id: 999,
            user_id: 1,
        })
        .await
        .unwrap();
    harness
        .queue
        .enqueue(&IssuanceRequest {
            coupon_id: 7,
            user_id: 2,
        })
        .await
        .unwrap();

    let settled = wait_until(|| harness.coupons.issued().len() == 1).await;
    assert!(settled, "valid request behind a bad one was not processed");
    assert_eq!(harness.coupons.issued()[0].user_id, 2);

    stop_worker(harness).await;
}
