use sea_orm::entity::prelude::*;

/// Limited-supply coupon. `issued_quantity` is the contended counter — it is
/// written only by the issuance transaction (single queue consumer, or the
/// coupon-locked synchronous path).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub coupon_name: String,
    pub total_quantity: i32,
    pub issued_quantity: i32,
    pub limit_per_user: i32,
    pub valid_from: chrono::DateTime<chrono::Utc>,
    pub valid_until: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_coupons::Entity")]
    UserCoupons,
}

impl Related<super::user_coupons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCoupons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
