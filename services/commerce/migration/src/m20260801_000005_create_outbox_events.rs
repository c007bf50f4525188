use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OutboxEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OutboxEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::AggregateType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::AggregateId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::EventType)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxEvents::Payload).text().not_null())
                    .col(ColumnDef::new(OutboxEvents::Status).string_len(20).not_null())
                    .col(
                        ColumnDef::new(OutboxEvents::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::MaxRetry)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(OutboxEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OutboxEvents::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OutboxEvents::LastRetryAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OutboxEvents::ErrorMessage).text())
                    .to_owned(),
            )
            .await?;

        // Index for the retry sweep (PENDING rows by age).
        manager
            .create_index(
                Index::create()
                    .table(OutboxEvents::Table)
                    .col(OutboxEvents::Status)
                    .col(OutboxEvents::CreatedAt)
                    .name("idx_outbox_events_status_created")
                    .to_owned(),
            )
            .await?;

        // Index for aggregate lookups (operator tooling, debugging).
        manager
            .create_index(
                Index::create()
                    .table(OutboxEvents::Table)
                    .col(OutboxEvents::AggregateType)
                    .col(OutboxEvents::AggregateId)
                    .name("idx_outbox_events_aggregate")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboxEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum OutboxEvents {
    Table,
    Id,
    AggregateType,
    AggregateId,
    EventType,
    Payload,
    Status,
    RetryCount,
    MaxRetry,
    CreatedAt,
    PublishedAt,
    LastRetryAt,
    ErrorMessage,
}
