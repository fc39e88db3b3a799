pub use sea_orm_migration::prelude::*;

mod m20261018_090000_create_accounts;
mod m20261018_090100_create_grants;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261018_090000_create_accounts::Migration),
            Box::new(m20261018_090100_create_grants::Migration),
        ]
    }
}
