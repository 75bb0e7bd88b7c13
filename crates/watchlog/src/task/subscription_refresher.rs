use std::sync::Arc;

use tokio::time;

use crate::config::VersionedConfig;
use crate::history::WatchHistory;
use crate::subscriptions::{SubscriptionDigests, refresh_subscriptions};
use crate::youtube::PageFetcher;

/// 启动周期刷新订阅的任务，每轮先重试待同步的观看记录
pub async fn subscription_refresher(
    fetcher: Arc<dyn PageFetcher>,
    history: WatchHistory,
    digests: Arc<SubscriptionDigests>,
) {
    loop {
        info!("开始执行本轮订阅刷新任务..");
        let config = VersionedConfig::get().load_full();
        'inner: {
            if let Err(e) = config.check() {
                error!("配置检查失败，跳过本轮执行：\n{:#}", e);
                break 'inner;
            }
            if let Err(e) = history.reconcile().await {
                warn!("同步待写入的观看记录失败：{:#}，将在下一轮重试", e);
            }
            refresh_subscriptions(fetcher.clone(), &history, &digests).await;
            info!("本轮任务执行完毕，等待下一轮执行");
        }
        time::sleep(time::Duration::from_secs(config.interval)).await;
    }
}
