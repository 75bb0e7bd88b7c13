use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::VersionedConfig;
use crate::error::FeedError;
use crate::feed::{DrainController, DrainMode};
use crate::history::WatchHistory;
use crate::youtube::{PageFetcher, SourceId, VideoRecord};

/// 摘要中保留的最新视频数量
const NEWEST_VIDEOS: usize = 5;

/// 某个订阅来源最近一次刷新的结果
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDigest {
    pub source: SourceId,
    pub unwatched: usize,
    pub newest: Vec<VideoRecord>,
    pub error: Option<FeedError>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SubscriptionDigests {
    inner: RwLock<Vec<SubscriptionDigest>>,
}

impl SubscriptionDigests {
    pub fn list(&self) -> Vec<SubscriptionDigest> {
        self.inner.read().clone()
    }

    fn replace(&self, digests: Vec<SubscriptionDigest>) {
        *self.inner.write() = digests;
    }
}

/// 以全量模式拉取每个订阅来源，每个来源使用独立的控制器，来源之间并发执行
pub async fn refresh_subscriptions(
    fetcher: Arc<dyn PageFetcher>,
    history: &WatchHistory,
    digests: &SubscriptionDigests,
) -> Vec<SubscriptionDigest> {
    let (sources, concurrency) = {
        let config = VersionedConfig::get().load();
        (config.subscriptions.clone(), config.concurrent_limit.sources.max(1))
    };
    if sources.is_empty() {
        info!("没有订阅任何来源，跳过刷新");
        digests.replace(Vec::new());
        return Vec::new();
    }
    let refreshed = stream::iter(sources)
        .map(|source| {
            let controller = DrainController::new(fetcher.clone(), history.clone(), DrainMode::Eager);
            async move { refresh_source(&controller, source).await }
        })
        .buffered(concurrency)
        .collect::<Vec<_>>()
        .await;
    let failed = refreshed.iter().filter(|d| d.error.is_some()).count();
    info!(
        "订阅刷新完毕，共 {} 个来源，{} 个失败，{} 个未观看的视频",
        refreshed.len(),
        failed,
        refreshed.iter().map(|d| d.unwatched).sum::<usize>()
    );
    digests.replace(refreshed.clone());
    refreshed
}

async fn refresh_source(controller: &DrainController, source: SourceId) -> SubscriptionDigest {
    controller.start_browsing(source.clone()).await;
    let snapshot = controller.snapshot();
    if let Some(e) = &snapshot.error {
        error!("刷新订阅 {} 失败：{:#}", source, e);
    }
    let mut newest = snapshot.videos;
    // 上传列表本身大致按时间倒序，这里按发布时间重新排序以兼容普通播放列表
    newest.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let unwatched = newest.len();
    newest.truncate(NEWEST_VIDEOS);
    SubscriptionDigest {
        source,
        unwatched,
        newest,
        error: snapshot.error,
        refreshed_at: Utc::now(),
    }
}
