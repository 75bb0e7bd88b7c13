use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchMark::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WatchMark::VideoId).string().not_null().primary_key())
                    .col(ColumnDef::new(WatchMark::Title).string().not_null().default(""))
                    .col(ColumnDef::new(WatchMark::ThumbnailUrl).string().not_null().default(""))
                    .col(ColumnDef::new(WatchMark::ChannelTitle).string().not_null().default(""))
                    .col(ColumnDef::new(WatchMark::PublishedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(WatchMark::SourceUrl).string().not_null().default(""))
                    .col(
                        ColumnDef::new(WatchMark::WatchedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchMark::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WatchMark {
    Table,
    VideoId,
    Title,
    ThumbnailUrl,
    ChannelTitle,
    PublishedAt,
    SourceUrl,
    WatchedAt,
}
