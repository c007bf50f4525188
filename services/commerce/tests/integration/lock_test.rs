use uuid::Uuid;

use maru_commerce::domain::types::{
    EVENT_COUPON_ISSUED, EVENT_ORDER_COMPLETED, IssuanceRequest, OutboxStatus,
};
use maru_commerce::error::CommerceServiceError;
use maru_commerce::outbox::service::OutboxService;
use maru_commerce::usecase::complete_order::{CompleteOrderInput, CompleteOrderUseCase};
use maru_commerce::usecase::issue_coupon::IssueCouponUseCase;

use crate::helpers::{
    MockCouponStore, MockLockPort, MockOrderStore, MockOutboxStore, MockPublisher, test_coupon,
};

#[tokio::test]
async fn should_issue_under_coupon_lock_and_publish() {
    let outbox = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let locks = MockLockPort::granting();
    let uc = IssueCouponUseCase {
        locks: locks.clone(),
        coupons: MockCouponStore::with_coupons(vec![test_coupon(7, 1, 1)], outbox.clone()),
        outbox: OutboxService::new(outbox.clone(), publisher.clone()),
    };

    let grant = uc
        .execute(IssuanceRequest {
            coupon_id: 7,
            user_id: 100,
        })
        .await
        .unwrap();
    assert_eq!(grant.coupon_id, 7);
    assert_eq!(grant.user_id, 100);

    // The critical section ran under the coupon key.
    assert_eq!(locks.requested(), vec![vec!["LOCK:COUPON:7".to_owned()]]);

    // The grant's event went out after the store transaction.
    let rows = outbox.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, EVENT_COUPON_ISSUED);
    assert_eq!(rows[0].status, OutboxStatus::Published);
    assert_eq!(publisher.published().len(), 1);
}

#[tokio::test]
async fn should_surface_resource_busy_when_coupon_lock_times_out() {
    let outbox = MockOutboxStore::empty();
    let coupons = MockCouponStore::with_coupons(vec![test_coupon(7, 1, 1)], outbox.clone());
    let uc = IssueCouponUseCase {
        locks: MockLockPort::timing_out(),
        coupons: coupons.clone(),
        outbox: OutboxService::new(outbox.clone(), MockPublisher::reliable()),
    };

    let result = uc
        .execute(IssuanceRequest {
            coupon_id: 7,
            user_id: 100,
        })
        .await;

    assert!(
        matches!(result, Err(CommerceServiceError::ResourceBusy)),
        "expected ResourceBusy, got {result:?}"
    );
    // Nothing ran without the lock: no grant, no counter change, no event.
    assert!(coupons.issued().is_empty());
    assert_eq!(coupons.coupon(7).unwrap().issued_quantity, 0);
    assert!(outbox.rows().is_empty());
}

#[tokio::test]
async fn should_complete_order_under_all_resource_locks() {
    let order_id = Uuid::new_v4();
    let outbox = MockOutboxStore::empty();
    let publisher = MockPublisher::reliable();
    let locks = MockLockPort::granting();
    let orders = MockOrderStore::with_orders(vec![order_id], outbox.clone());
    let uc = CompleteOrderUseCase {
        locks: locks.clone(),
        orders: orders.clone(),
        outbox: OutboxService::new(outbox.clone(), publisher.clone()),
    };

    uc.execute(CompleteOrderInput {
        order_id,
        user_id: 100,
        product_option_ids: vec![2, 1],
        total_amount: 42_000,
    })
    .await
    .unwrap();

    // Every touched resource was requested: both option rows and the
    // buyer's point balance.
    let requested = locks.requested();
    assert_eq!(requested.len(), 1);
    assert_eq!(
        requested[0],
        vec![
            "LOCK:PRODUCT_OPTION:2".to_owned(),
            "LOCK:PRODUCT_OPTION:1".to_owned(),
            "LOCK:USER_POINT:100".to_owned(),
        ]
    );

    assert_eq!(orders.status(order_id).as_deref(), Some("COMPLETED"));

    let rows = outbox.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, EVENT_ORDER_COMPLETED);
    assert_eq!(rows[0].aggregate_id, order_id.to_string());
    assert_eq!(rows[0].status, OutboxStatus::Published);

    // Keyed by the order id for per-aggregate ordering.
    assert_eq!(publisher.published()[0].1, order_id.to_string());
}

#[tokio::test]
async fn should_not_touch_order_when_multi_lock_times_out() {
    let order_id = Uuid::new_v4();
    let outbox = MockOutboxStore::empty();
    let orders = MockOrderStore::with_orders(vec![order_id], outbox.clone());
    let uc = CompleteOrderUseCase {
        locks: MockLockPort::timing_out(),
        orders: orders.clone(),
        outbox: OutboxService::new(outbox.clone(), MockPublisher::reliable()),
    };

    let result = uc
        .execute(CompleteOrderInput {
            order_id,
            user_id: 100,
            product_option_ids: vec![1],
            total_amount: 42_000,
        })
        .await;

    assert!(matches!(result, Err(CommerceServiceError::ResourceBusy)));
    assert_eq!(orders.status(order_id).as_deref(), Some("PAID"));
    assert!(outbox.rows().is_empty());
}
