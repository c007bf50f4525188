use anyhow::Context as _;
use uuid::Uuid;

use maru_lock::distributed::lock_key;

use crate::domain::repository::{LockPort, MessagePublisher, OrderStore, OutboxStore};
use crate::domain::types::{
    AGGREGATE_ORDER, EVENT_ORDER_COMPLETED, NewOutboxEvent, OrderCompletedEvent,
};
use crate::error::CommerceServiceError;
use crate::outbox::service::OutboxService;

pub struct CompleteOrderInput {
    pub order_id: Uuid,
    pub user_id: i64,
    pub product_option_ids: Vec<i64>,
    pub total_amount: i64,
}

/// Multi-resource completion path.
///
/// An order completion reserves several independent resources at once —
/// every product-option stock row it touches plus the buyer's point
/// balance — so a single-key lock cannot close the cross-resource races.
/// All keys are acquired all-or-nothing (deduplicated and globally
/// ordered by the executor) before the order row and its `OrderCompleted`
/// outbox row are written in one transaction. The immediate publish fires
/// after that transaction returns.
pub struct CompleteOrderUseCase<L, O, S, P> {
    pub locks: L,
    pub orders: O,
    pub outbox: OutboxService<S, P>,
}

impl<L, O, S, P> CompleteOrderUseCase<L, O, S, P>
where
    L: LockPort,
    O: OrderStore,
    S: OutboxStore,
    P: MessagePublisher,
{
    pub async fn execute(&self, input: CompleteOrderInput) -> Result<(), CommerceServiceError> {
        let mut keys: Vec<String> = input
            .product_option_ids
            .iter()
            .map(|id| lock_key("PRODUCT_OPTION", id))
            .collect();
        keys.push(lock_key("USER_POINT", input.user_id));

        let payload = serde_json::to_string(&OrderCompletedEvent {
            order_id: input.order_id,
            user_id: input.user_id,
            total_amount: input.total_amount,
        })
        .context("serialize OrderCompleted payload")?;
        let new_event = NewOutboxEvent {
            aggregate_type: AGGREGATE_ORDER.to_owned(),
            aggregate_id: input.order_id.to_string(),
            event_type: EVENT_ORDER_COMPLETED.to_owned(),
            payload,
        };

        let outcome = self
            .locks
            .with_locks(&keys, || {
                self.orders.complete_with_outbox(input.order_id, &new_event)
            })
            .await?;
        let event = outcome?;

        // Post-commit hook: completion is durable, announce it.
        self.outbox.publish_event(&event).await;
        Ok(())
    }
}
