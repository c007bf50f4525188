use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConsumedEventLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsumedEventLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ConsumedEventLogs::EventId)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsumedEventLogs::EventType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsumedEventLogs::ProcessedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ConsumedEventLogs::ConsumerName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConsumedEventLogs::Payload).text())
                    .col(
                        ColumnDef::new(ConsumedEventLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // The idempotency guard: one ledger row per (event, event type).
        manager
            .create_index(
                Index::create()
                    .table(ConsumedEventLogs::Table)
                    .col(ConsumedEventLogs::EventId)
                    .col(ConsumedEventLogs::EventType)
                    .unique()
                    .name("uk_consumed_event")
                    .to_owned(),
            )
            .await?;

        // Index for the age-based retention delete.
        manager
            .create_index(
                Index::create()
                    .table(ConsumedEventLogs::Table)
                    .col(ConsumedEventLogs::CreatedAt)
                    .name("idx_consumed_event_logs_created")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsumedEventLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ConsumedEventLogs {
    Table,
    Id,
    EventId,
    EventType,
    ProcessedAt,
    ConsumerName,
    Payload,
    CreatedAt,
}
