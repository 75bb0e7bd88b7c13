#[macro_use]
extern crate tracing;

mod api;
mod config;
mod database;
mod error;
mod feed;
mod history;
mod subscriptions;
mod task;
mod utils;
mod youtube;

use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use task::{http_server, subscription_refresher};
use tokio_util::sync::CancellationToken;

use crate::config::{ARGS, CONFIG_DIR, VersionedConfig, version};
use crate::database::{database_connection, migrate_database};
use crate::feed::DrainController;
use crate::history::{DatabaseWatchStore, LocalWatchCache, WatchHistory};
use crate::subscriptions::{SubscriptionDigests, refresh_subscriptions};
use crate::utils::init_logger;
use crate::utils::signal::terminate;
use crate::youtube::{PageFetcher, YouTubeClient};

#[tokio::main]
async fn main() {
    let (fetcher, history, digests) = init().await;
    if ARGS.refresh_once {
        if let Err(e) = history.reconcile().await {
            warn!("同步待写入的观看记录失败：{:#}", e);
        }
        refresh_subscriptions(fetcher, &history, &digests).await;
        return;
    }
    let mode = VersionedConfig::get().load().drain_mode;
    let controller = Arc::new(DrainController::new(fetcher.clone(), history.clone(), mode));
    let token = CancellationToken::new();
    let tracker = tokio_util::task::TaskTracker::new();

    spawn_task("HTTP 服务", http_server(controller, digests.clone()), &tracker, token.clone());
    spawn_task(
        "订阅刷新",
        async move {
            subscription_refresher(fetcher, history, digests).await;
            Ok::<_, std::convert::Infallible>(())
        },
        &tracker,
        token.clone(),
    );

    tracker.close();
    handle_shutdown(tracker, token).await
}

fn spawn_task<T: Debug>(
    task_name: &'static str,
    task: impl Future<Output = std::result::Result<(), T>> + Send + 'static,
    tracker: &tokio_util::task::TaskTracker,
    token: CancellationToken,
) {
    tracker.spawn(async move {
        tokio::select! {
            res = task => {
                if let Err(e) = res {
                    error!("「{}」异常结束，错误为：{:?}，正在关闭..", task_name, e);
                } else {
                    info!("「{}」已结束，正在关闭..", task_name);
                }
                token.cancel();
            },
            _ = token.cancelled() => {
                info!("「{}」接收到取消信号，终止运行..", task_name);
            }
        }
    });
}

/// 初始化日志、配置、数据库与观看记录
async fn init() -> (Arc<dyn PageFetcher>, WatchHistory, Arc<SubscriptionDigests>) {
    LazyLock::force(&ARGS);
    init_logger(&ARGS.log_level);
    info!("欢迎使用 watchlog，当前程序版本：{}", version());
    let history = match build_history().await {
        Ok(history) => history,
        Err(e) => {
            error!("初始化失败：{:#}", e);
            std::process::exit(1);
        }
    };
    let fetcher: Arc<dyn PageFetcher> = Arc::new(YouTubeClient::new());
    (fetcher, history, Arc::new(SubscriptionDigests::default()))
}

async fn build_history() -> Result<WatchHistory> {
    VersionedConfig::init(&CONFIG_DIR.join("config.toml")).context("failed to load config")?;
    if let Err(e) = VersionedConfig::get().load().check() {
        warn!("配置检查未通过，请修改配置后再使用：\n{:#}", e);
    }
    migrate_database().await.context("failed to migrate database")?;
    let connection = database_connection().await?;
    let cache = LocalWatchCache::load(&CONFIG_DIR.join("watch_cache.json"))?;
    Ok(WatchHistory::new(
        Arc::new(cache),
        Arc::new(DatabaseWatchStore::new(connection)),
    ))
}

async fn handle_shutdown(tracker: tokio_util::task::TaskTracker, token: CancellationToken) {
    tokio::select! {
        _ = tracker.wait() => {
            info!("所有任务均已终止，程序退出")
        }
        _ = terminate() => {
            info!("接收到终止信号，正在终止任务..");
            token.cancel();
            tracker.wait().await;
            info!("所有任务均已终止，程序退出");
        }
    }
}
