pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_watch_mark;
mod m20250415_000001_add_watched_at_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_watch_mark::Migration),
            Box::new(m20250415_000001_add_watched_at_index::Migration),
        ]
    }
}
