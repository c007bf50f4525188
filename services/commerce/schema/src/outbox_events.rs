use sea_orm::entity::prelude::*;

/// Transactional outbox row. Inserted in the same transaction as the domain
/// mutation it announces; mutated only by the publisher and the poller;
/// deleted only by the retention sweep of old PUBLISHED rows.
///
/// `status` holds `PENDING`, `PUBLISHED` or `DEAD_LETTER` (see the domain
/// `OutboxStatus` type for the transition rules).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retry: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
