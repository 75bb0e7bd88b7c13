use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .table(WatchMark::Table)
                    .name("watch_mark_watched_at_index")
                    .col(WatchMark::WatchedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .table(WatchMark::Table)
                    .name("watch_mark_watched_at_index")
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum WatchMark {
    Table,
    WatchedAt,
}
