pub use sea_orm_migration::prelude::*;

mod m20260212_000001_create_deals_and_redemptions;
mod m20260219_000002_add_button_redemptions;
mod m20260226_000003_add_deal_code_pool;
mod m20260312_000004_enforce_single_issued;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260212_000001_create_deals_and_redemptions::Migration),
            Box::new(m20260219_000002_add_button_redemptions::Migration),
            Box::new(m20260226_000003_add_deal_code_pool::Migration),
            Box::new(m20260312_000004_enforce_single_issued::Migration),
        ]
    }
}
