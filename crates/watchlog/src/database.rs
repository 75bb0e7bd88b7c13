use std::time::Duration;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use watchlog_migration::{Migrator, MigratorTrait};

use crate::config::VersionedConfig;

fn database_url() -> String {
    VersionedConfig::get().load().database_url()
}

pub async fn database_connection() -> Result<DatabaseConnection> {
    let mut option = ConnectOptions::new(database_url());
    option
        .max_connections(100)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(90))
        .sqlx_logging(false);
    Database::connect(option)
        .await
        .context("failed to connect to database")
}

pub async fn migrate_database() -> Result<()> {
    // 迁移使用单独的默认连接，多连接的连接池可能导致迁移顺序异常
    let connection = Database::connect(database_url()).await?;
    Ok(Migrator::up(&connection, None).await?)
}
