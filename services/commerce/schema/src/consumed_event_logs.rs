use sea_orm::entity::prelude::*;

/// Idempotent-consumption ledger. The unique `(event_id, event_type)`
/// constraint is the sole dedup guard — a duplicate-key insert failure means
/// "already handled". Rows are never updated; an age-based retention job is
/// the only deleter.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "consumed_event_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub processed_at: chrono::DateTime<chrono::Utc>,
    pub consumer_name: String,
    pub payload: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
