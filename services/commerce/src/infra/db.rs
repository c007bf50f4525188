use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionError,
    TransactionTrait,
};
use uuid::Uuid;

use maru_commerce_schema::{consumed_event_logs, coupons, orders, outbox_events, user_coupons,
    user_points};

use crate::domain::repository::{
    ConsumedEventStore, CouponStore, OrderStore, OutboxStore, PointStore,
};
use crate::domain::types::{
    AGGREGATE_COUPON, ConsumedEvent, Coupon, CouponIssuedEvent, EVENT_COUPON_ISSUED,
    IssuanceRequest, NewOutboxEvent, OutboxEvent, OutboxStatus, UserCoupon,
};
use crate::error::CommerceServiceError;

/// Order status values the coordination layer writes.
const ORDER_STATUS_COMPLETED: &str = "COMPLETED";

fn db_err(err: sea_orm::DbErr) -> CommerceServiceError {
    CommerceServiceError::Internal(err.into())
}

fn txn_err(err: TransactionError<CommerceServiceError>) -> CommerceServiceError {
    match err {
        TransactionError::Connection(db) => CommerceServiceError::Internal(db.into()),
        TransactionError::Transaction(service) => service,
    }
}

// ── Coupon store ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCouponStore {
    pub db: DatabaseConnection,
}

impl CouponStore for DbCouponStore {
    async fn issue(
        &self,
        request: &IssuanceRequest,
    ) -> Result<(UserCoupon, OutboxEvent), CommerceServiceError> {
        let request = request.clone();
        self.db
            .transaction::<_, (UserCoupon, OutboxEvent), CommerceServiceError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();

                    // 1. Load the coupon → business error if unknown
                    let model = coupons::Entity::find_by_id(request.coupon_id)
                        .one(txn)
                        .await
                        .map_err(db_err)?
                        .ok_or(CommerceServiceError::CouponNotFound {
                            coupon_id: request.coupon_id,
                        })?;
                    let mut coupon = coupon_from_model(model);

                    // 2. Per-user issuance limit
                    let issued_to_user = user_coupons::Entity::find()
                        .filter(user_coupons::Column::CouponId.eq(request.coupon_id))
                        .filter(user_coupons::Column::UserId.eq(request.user_id))
                        .count(txn)
                        .await
                        .map_err(db_err)?;
                    if issued_to_user >= coupon.limit_per_user as u64 {
                        return Err(CommerceServiceError::CouponLimitPerUser {
                            coupon_id: coupon.id,
                        });
                    }

                    // 3. Validity window + remaining supply, then the
                    //    check-then-increment the callers serialize
                    coupon.validate_issuable(now)?;
                    coupon.increase_issued_quantity();
                    coupons::ActiveModel {
                        id: Set(coupon.id),
                        issued_quantity: Set(coupon.issued_quantity),
                        ..Default::default()
                    }
                    .update(txn)
                    .await
                    .map_err(db_err)?;

                    // 4. Grant row
                    let grant = UserCoupon {
                        id: Uuid::new_v4(),
                        coupon_id: coupon.id,
                        user_id: request.user_id,
                        issued_at: now,
                        used_at: None,
                    };
                    user_coupons::ActiveModel {
                        id: Set(grant.id),
                        coupon_id: Set(grant.coupon_id),
                        user_id: Set(grant.user_id),
                        issued_at: Set(grant.issued_at),
                        used_at: Set(None),
                    }
                    .insert(txn)
                    .await
                    .map_err(db_err)?;

                    // 5. CouponIssued outbox row, same transaction
                    let payload = serde_json::to_string(&CouponIssuedEvent {
                        coupon_id: coupon.id,
                        user_id: request.user_id,
                        user_coupon_id: grant.id,
                    })
                    .context("serialize CouponIssued payload")?;
                    let event = insert_outbox_event(
                        txn,
                        &NewOutboxEvent {
                            aggregate_type: AGGREGATE_COUPON.to_owned(),
                            aggregate_id: coupon.id.to_string(),
                            event_type: EVENT_COUPON_ISSUED.to_owned(),
                            payload,
                        },
                    )
                    .await
                    .map_err(db_err)?;

                    Ok((grant, event))
                })
            })
            .await
            .map_err(txn_err)
    }
}

fn coupon_from_model(model: coupons::Model) -> Coupon {
    Coupon {
        id: model.id,
        coupon_name: model.coupon_name,
        total_quantity: model.total_quantity,
        issued_quantity: model.issued_quantity,
        limit_per_user: model.limit_per_user,
        valid_from: model.valid_from,
        valid_until: model.valid_until,
        created_at: model.created_at,
    }
}

// ── Order store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOrderStore {
    pub db: DatabaseConnection,
}

impl OrderStore for DbOrderStore {
    async fn complete_with_outbox(
        &self,
        order_id: Uuid,
        event: &NewOutboxEvent,
    ) -> Result<OutboxEvent, CommerceServiceError> {
        let new_event = event.clone();
        self.db
            .transaction::<_, OutboxEvent, CommerceServiceError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let order = orders::Entity::find_by_id(order_id)
                        .one(txn)
                        .await
                        .map_err(db_err)?
                        .ok_or(CommerceServiceError::OrderNotFound { order_id })?;

                    orders::ActiveModel {
                        id: Set(order.id),
                        status: Set(ORDER_STATUS_COMPLETED.to_owned()),
                        completed_at: Set(Some(now)),
                        ..Default::default()
                    }
                    .update(txn)
                    .await
                    .map_err(db_err)?;

                    insert_outbox_event(txn, &new_event).await.map_err(db_err)
                })
            })
            .await
            .map_err(txn_err)
    }
}

// ── Point store ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPointStore {
    pub db: DatabaseConnection,
}

impl PointStore for DbPointStore {
    async fn charge(&self, user_id: i64, amount: i64) -> Result<i64, CommerceServiceError> {
        self.db
            .transaction::<_, i64, CommerceServiceError>(|txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let existing = user_points::Entity::find_by_id(user_id)
                        .one(txn)
                        .await
                        .map_err(db_err)?;
                    let balance = match existing {
                        Some(row) => {
                            let balance = row.balance + amount;
                            user_points::ActiveModel {
                                user_id: Set(user_id),
                                balance: Set(balance),
                                updated_at: Set(now),
                            }
                            .update(txn)
                            .await
                            .map_err(db_err)?;
                            balance
                        }
                        None => {
                            user_points::ActiveModel {
                                user_id: Set(user_id),
                                balance: Set(amount),
                                updated_at: Set(now),
                            }
                            .insert(txn)
                            .await
                            .map_err(db_err)?;
                            amount
                        }
                    };
                    Ok(balance)
                })
            })
            .await
            .map_err(txn_err)
    }
}

// ── Outbox store ─────────────────────────────────────────────────────────────

/// Insert one outbox row inside the caller's transaction. This is the only
/// way an outbox row is born: if the surrounding domain mutation rolls
/// back, so does the event.
pub async fn insert_outbox_event(
    txn: &DatabaseTransaction,
    new_event: &NewOutboxEvent,
) -> Result<OutboxEvent, sea_orm::DbErr> {
    let event = OutboxEvent::from_new(new_event, Utc::now());
    outbox_events::ActiveModel {
        id: Set(event.id),
        aggregate_type: Set(event.aggregate_type.clone()),
        aggregate_id: Set(event.aggregate_id.clone()),
        event_type: Set(event.event_type.clone()),
        payload: Set(event.payload.clone()),
        status: Set(event.status.as_str().to_owned()),
        retry_count: Set(event.retry_count),
        max_retry: Set(event.max_retry),
        created_at: Set(event.created_at),
        published_at: Set(None),
        last_retry_at: Set(None),
        error_message: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(event)
}

#[derive(Clone)]
pub struct DbOutboxStore {
    pub db: DatabaseConnection,
}

impl DbOutboxStore {
    /// Load-modify-store one row inside a transaction, applying a domain
    /// transition. The domain methods keep terminal states sticky, so a
    /// stale caller cannot move a row backwards.
    async fn apply<F>(&self, id: Uuid, apply: F) -> Result<OutboxEvent, CommerceServiceError>
    where
        F: FnOnce(&mut OutboxEvent) + Send + 'static,
    {
        self.db
            .transaction::<_, OutboxEvent, CommerceServiceError>(|txn| {
                Box::pin(async move {
                    let model = outbox_events::Entity::find_by_id(id)
                        .one(txn)
                        .await
                        .map_err(db_err)?
                        .ok_or_else(|| {
                            CommerceServiceError::Internal(anyhow::anyhow!(
                                "outbox event {id} not found"
                            ))
                        })?;
                    let mut event = outbox_from_model(model)?;
                    apply(&mut event);
                    outbox_events::ActiveModel {
                        id: Set(event.id),
                        status: Set(event.status.as_str().to_owned()),
                        retry_count: Set(event.retry_count),
                        published_at: Set(event.published_at),
                        last_retry_at: Set(event.last_retry_at),
                        error_message: Set(event.error_message.clone()),
                        ..Default::default()
                    }
                    .update(txn)
                    .await
                    .map_err(db_err)?;
                    Ok(event)
                })
            })
            .await
            .map_err(txn_err)
    }
}

impl OutboxStore for DbOutboxStore {
    async fn mark_published(&self, id: Uuid) -> Result<(), CommerceServiceError> {
        let now = Utc::now();
        self.apply(id, move |event| event.mark_published(now)).await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<OutboxStatus, CommerceServiceError> {
        let now = Utc::now();
        let error = error.to_owned();
        let event = self
            .apply(id, move |event| {
                event.register_failure(&error, now);
            })
            .await?;
        Ok(event.status)
    }

    async fn fetch_pending_for_retry(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<OutboxEvent>, CommerceServiceError> {
        // FOR UPDATE SKIP LOCKED inside a short transaction: concurrent
        // sweeps (other poller instances) skip rows this one is holding
        // instead of double-publishing them.
        let txn = self.db.begin().await.map_err(db_err)?;
        let models = outbox_events::Entity::find()
            .filter(outbox_events::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(outbox_events::Column::CreatedAt.lt(older_than))
            .order_by_asc(outbox_events::Column::CreatedAt)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        models.into_iter().map(outbox_from_model).collect()
    }

    async fn delete_published_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<u64, CommerceServiceError> {
        let result = outbox_events::Entity::delete_many()
            .filter(outbox_events::Column::Status.eq(OutboxStatus::Published.as_str()))
            .filter(outbox_events::Column::PublishedAt.lt(threshold))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

fn outbox_from_model(model: outbox_events::Model) -> Result<OutboxEvent, CommerceServiceError> {
    let status = OutboxStatus::parse(&model.status).ok_or_else(|| {
        CommerceServiceError::Internal(anyhow::anyhow!(
            "unknown outbox status {:?} on event {}",
            model.status,
            model.id
        ))
    })?;
    Ok(OutboxEvent {
        id: model.id,
        aggregate_type: model.aggregate_type,
        aggregate_id: model.aggregate_id,
        event_type: model.event_type,
        payload: model.payload,
        status,
        retry_count: model.retry_count,
        max_retry: model.max_retry,
        created_at: model.created_at,
        published_at: model.published_at,
        last_retry_at: model.last_retry_at,
        error_message: model.error_message,
    })
}

// ── Consumed-event store ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbConsumedEventStore {
    pub db: DatabaseConnection,
}

impl ConsumedEventStore for DbConsumedEventStore {
    async fn exists(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, CommerceServiceError> {
        let count = consumed_event_logs::Entity::find()
            .filter(consumed_event_logs::Column::EventId.eq(event_id))
            .filter(consumed_event_logs::Column::EventType.eq(event_type))
            .count(&self.db)
            .await
            .context("check consumed-event ledger")?;
        Ok(count > 0)
    }

    async fn insert(&self, record: &ConsumedEvent) -> Result<bool, CommerceServiceError> {
        let result = consumed_event_logs::ActiveModel {
            id: Set(record.id),
            event_id: Set(record.event_id.clone()),
            event_type: Set(record.event_type.clone()),
            processed_at: Set(record.processed_at),
            consumer_name: Set(record.consumer_name.clone()),
            payload: Set(record.payload.clone()),
            created_at: Set(record.processed_at),
        }
        .insert(&self.db)
        .await;
        match result {
            Ok(_) => Ok(true),
            // The unique (event_id, event_type) constraint is the
            // idempotency guard: losing the insert race means the event was
            // already handled.
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(false)
            }
            Err(err) => Err(db_err(err)),
        }
    }

    async fn delete_older_than(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<u64, CommerceServiceError> {
        let result = consumed_event_logs::Entity::delete_many()
            .filter(consumed_event_logs::Column::CreatedAt.lt(threshold))
            .exec(&self.db)
            .await
            .context("consumed-event retention delete")?;
        Ok(result.rows_affected)
    }
}
