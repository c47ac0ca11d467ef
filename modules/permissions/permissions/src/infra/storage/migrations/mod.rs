use sea_orm_migration::prelude as mig;

mod m20260101_000001_create_permission_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl mig::MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn mig::MigrationTrait>> {
        vec![Box::new(
            m20260101_000001_create_permission_tables::Migration,
        )]
    }
}
