use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserCoupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserCoupons::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserCoupons::CouponId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserCoupons::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(UserCoupons::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserCoupons::UsedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_coupons_coupon")
                            .from(UserCoupons::Table, UserCoupons::CouponId)
                            .to(Coupons::Table, Coupons::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the per-user issuance limit count.
        manager
            .create_index(
                Index::create()
                    .table(UserCoupons::Table)
                    .col(UserCoupons::CouponId)
                    .col(UserCoupons::UserId)
                    .name("idx_user_coupons_coupon_user")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserCoupons::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserCoupons {
    Table,
    Id,
    CouponId,
    UserId,
    IssuedAt,
    UsedAt,
}

#[derive(Iden)]
enum Coupons {
    Table,
    Id,
}
