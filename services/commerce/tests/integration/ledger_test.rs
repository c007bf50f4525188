use uuid::Uuid;

use maru_commerce::consumed::ledger::ConsumedEventLedger;
use maru_commerce::domain::types::{EVENT_ORDER_COMPLETED, OrderCompletedEvent};
use maru_commerce::worker::order_events::{ORDER_COMPLETED_CONSUMER, OrderCompletedConsumer};

use crate::helpers::MockLedgerStore;

fn consumer(store: MockLedgerStore) -> OrderCompletedConsumer<MockLedgerStore> {
    OrderCompletedConsumer::new(ConsumedEventLedger::new(store, ORDER_COMPLETED_CONSUMER))
}

fn order_payload(order_id: Uuid) -> String {
    serde_json::to_string(&OrderCompletedEvent {
        order_id,
        user_id: 100,
        total_amount: 25_000,
    })
    .unwrap()
}

#[tokio::test]
async fn should_apply_side_effect_once_for_redelivered_event() {
    let store = MockLedgerStore::empty();
    let consumer = consumer(store.clone());
    let payload = order_payload(Uuid::new_v4());

    let first = consumer.handle(&payload).await.unwrap();
    let second = consumer.handle(&payload).await.unwrap();

    assert!(first, "first delivery must apply the side effect");
    assert!(!second, "redelivery must be a no-op");

    let rows = store.rows();
    assert_eq!(rows.len(), 1, "exactly one ledger row per event");
    assert_eq!(rows[0].event_type, EVENT_ORDER_COMPLETED);
    assert_eq!(rows[0].consumer_name, ORDER_COMPLETED_CONSUMER);
}

#[tokio::test]
async fn should_treat_losing_the_insert_race_as_already_handled() {
    let store = MockLedgerStore::empty();
    let ledger = ConsumedEventLedger::new(store.clone(), ORDER_COMPLETED_CONSUMER);

    // Two instances recording the same event: the second insert collides
    // with the unique constraint and must not surface an error.
    ledger
        .record_processed("42", EVENT_ORDER_COMPLETED, None)
        .await
        .unwrap();
    ledger
        .record_processed("42", EVENT_ORDER_COMPLETED, None)
        .await
        .unwrap();

    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn should_record_distinct_event_types_separately() {
    let store = MockLedgerStore::empty();
    let ledger = ConsumedEventLedger::new(store.clone(), ORDER_COMPLETED_CONSUMER);

    // Same event id under two types: both rows stand (the key is the pair).
    ledger
        .record_processed("42", "OrderCompleted", None)
        .await
        .unwrap();
    ledger
        .record_processed("42", "OrderCancelled", None)
        .await
        .unwrap();

    assert_eq!(store.rows().len(), 2);
}

#[tokio::test]
async fn should_drop_malformed_payload_without_ledger_row() {
    let store = MockLedgerStore::empty();
    let consumer = consumer(store.clone());

    let applied = consumer.handle("not json at all").await.unwrap();

    assert!(!applied);
    assert!(store.rows().is_empty());
}
