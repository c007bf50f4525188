use chrono::Utc;

use maru_commerce::config::CommerceConfig;
use maru_commerce::domain::repository::OutboxStore;
use maru_commerce::domain::types::{
    AGGREGATE_ORDER, EVENT_ORDER_COMPLETED, NewOutboxEvent, OutboxEvent, OutboxStatus,
};
use maru_commerce::outbox::poller::OutboxPoller;
use maru_commerce::outbox::service::OutboxService;

use crate::helpers::{MockLedgerStore, MockOutboxStore, MockPublisher};

fn pending_event() -> OutboxEvent {
    OutboxEvent::from_new(
        &NewOutboxEvent {
            aggregate_type: AGGREGATE_ORDER.to_owned(),
            aggregate_id: "order-42".to_owned(),
            event_type: EVENT_ORDER_COMPLETED.to_owned(),
            payload: r#"{"order_id":42}"#.to_owned(),
        },
        Utc::now(),
    )
}

fn test_config() -> CommerceConfig {
    CommerceConfig {
        database_url: "postgres://unused".to_owned(),
        redis_url: "redis://unused".to_owned(),
        lock_wait_ms: 3000,
        issue_queue_key: "coupon:issue:queue".to_owned(),
        outbox_retry_sweep_secs: 7,
        outbox_retry_grace_secs: 7,
        outbox_retry_batch: 100,
        outbox_retention_sweep_secs: 86_400,
        outbox_retention_days: 7,
        event_consumer_group: "commerce".to_owned(),
        event_consumer_name: "commerce-test".to_owned(),
    }
}

#[tokio::test]
async fn should_mark_published_on_broker_ack() {
    let store = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let service = OutboxService::new(store.clone(), publisher.clone());

    let event = pending_event();
    store.put(event.clone());

    service.publish_event(&event).await;

    let row = store.get(event.id).unwrap();
    assert_eq!(row.status, OutboxStatus::Published);
    assert!(row.published_at.is_some());
    assert_eq!(row.retry_count, 0);

    // Routed by aggregate id so same-aggregate events stay ordered.
    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, EVENT_ORDER_COMPLETED);
    assert_eq!(published[0].1, "order-42");
}

#[tokio::test]
async fn should_publish_after_two_failures_within_retry_budget() {
    let store = MockOutboxStore::empty();
    let publisher = MockPublisher::failing(2);
    let service = OutboxService::new(store.clone(), publisher.clone());

    let event = pending_event();
    store.put(event.clone());

    // Immediate attempt plus two poller retries, refetching like the
    // poller does.
    for _ in 0..3 {
        let current = store.get(event.id).unwrap();
        service.publish_event(&current).await;
    }

    let row = store.get(event.id).unwrap();
    assert_eq!(row.status, OutboxStatus::Published);
    assert_eq!(row.retry_count, 2);
    assert_eq!(publisher.attempts(), 3);
}

#[tokio::test]
async fn should_dead_letter_after_exhausting_retry_budget() {
    let store = MockOutboxStore::empty();
    let publisher = MockPublisher::failing(u32::MAX);
    let service = OutboxService::new(store.clone(), publisher.clone());

    let event = pending_event();
    store.put(event.clone());

    for _ in 0..3 {
        let current = store.get(event.id).unwrap();
        service.publish_event(&current).await;
    }

    let row = store.get(event.id).unwrap();
    assert_eq!(row.status, OutboxStatus::DeadLetter);
    assert_eq!(row.retry_count, 3);
    assert_eq!(row.error_message.as_deref(), Some("broker unreachable"));

    // Dead-lettered rows are invisible to the retry sweep and skipped by
    // the publisher: no further attempts, ever.
    let stale = Utc::now() + chrono::Duration::seconds(1);
    assert!(
        store.fetch_pending_for_retry(stale, 100).await.unwrap().is_empty(),
        "retry sweep must never see DEAD_LETTER rows"
    );
    let current = store.get(event.id).unwrap();
    service.publish_event(&current).await;
    assert_eq!(publisher.attempts(), 3, "dead-lettered event was re-attempted");
}

#[tokio::test]
async fn should_leave_fresh_pending_rows_to_the_immediate_publish() {
    let store = MockOutboxStore::empty();
    store.put(pending_event());

    // Grace window: rows younger than the threshold stay untouched.
    let threshold = Utc::now() - chrono::Duration::seconds(7);
    let stale = store.fetch_pending_for_retry(threshold, 100).await.unwrap();
    assert!(stale.is_empty());
}

#[tokio::test]
async fn should_republish_stale_pending_rows_in_retry_sweep() {
    let store = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let service = OutboxService::new(store.clone(), publisher.clone());
    let ledger = MockLedgerStore::empty();

    let mut event = pending_event();
    event.created_at = Utc::now() - chrono::Duration::seconds(30);
    store.put(event.clone());

    let poller = OutboxPoller::new(service, store.clone(), ledger, &test_config());
    poller.retry_sweep().await;

    assert_eq!(store.get(event.id).unwrap().status, OutboxStatus::Published);
    assert_eq!(publisher.attempts(), 1);
}

#[tokio::test]
async fn should_reap_only_old_published_rows_in_retention_sweep() {
    let store = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let service = OutboxService::new(store.clone(), publisher.clone());
    let ledger = MockLedgerStore::empty();

    // An old published row, a fresh published row, and an old dead letter.
    let mut old_published = pending_event();
    old_published.mark_published(Utc::now() - chrono::Duration::days(10));
    store.put(old_published.clone());

    let mut fresh_published = pending_event();
    fresh_published.mark_published(Utc::now());
    store.put(fresh_published.clone());

    let mut dead = pending_event();
    dead.created_at = Utc::now() - chrono::Duration::days(30);
    for _ in 0..3 {
        dead.register_failure("down", Utc::now() - chrono::Duration::days(30));
    }
    store.put(dead.clone());

    let poller = OutboxPoller::new(service, store.clone(), ledger, &test_config());
    poller.retention_sweep().await;

    assert!(store.get(old_published.id).is_none(), "old published row kept");
    assert!(store.get(fresh_published.id).is_some(), "fresh row reaped");
    assert!(
        store.get(dead.id).is_some(),
        "DEAD_LETTER rows must never be auto-deleted"
    );
}
