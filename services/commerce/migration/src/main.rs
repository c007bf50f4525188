use sea_orm_migration::prelude::*;

mod m20260801_000001_create_coupons;
mod m20260801_000002_create_user_coupons;
mod m20260801_000003_create_orders;
mod m20260801_000004_create_user_points;
mod m20260801_000005_create_outbox_events;
mod m20260801_000006_create_consumed_event_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_coupons::Migration),
            Box::new(m20260801_000002_create_user_coupons::Migration),
            Box::new(m20260801_000003_create_orders::Migration),
            Box::new(m20260801_000004_create_user_points::Migration),
            Box::new(m20260801_000005_create_outbox_events::Migration),
            Box::new(m20260801_000006_create_consumed_event_logs::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
