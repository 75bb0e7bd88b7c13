use std::sync::Arc;

use futures::{StreamExt, stream};
use itertools::Itertools;

use crate::config::VersionedConfig;
use crate::error::FeedError;
use crate::history::{CHECK_BATCH_SIZE, LocalWatchCache, WatchStore};
use crate::youtube::VideoRecord;

/// 去重结果，`unresolved` 是因远端检查失败而被排除的视频数量
#[derive(Debug, Default)]
pub struct Deduped {
    pub videos: Vec<VideoRecord>,
    pub unresolved: usize,
    pub failure: Option<FeedError>,
}

/// 先查本地缓存，再按批查询远端存储，过滤掉已观看的视频
#[derive(Clone)]
pub struct DedupFilter {
    cache: Arc<LocalWatchCache>,
    store: Arc<dyn WatchStore>,
}

impl DedupFilter {
    pub fn new(cache: Arc<LocalWatchCache>, store: Arc<dyn WatchStore>) -> Self {
        Self { cache, store }
    }

    /// 过滤结果保持输入的相对顺序；某一批远端检查失败时，该批视频视为未确认而被排除
    pub async fn filter_unwatched(&self, candidates: Vec<VideoRecord>) -> Deduped {
        if candidates.is_empty() {
            return Deduped::default();
        }
        let candidates = self.cache.retain_unwatched(candidates);
        if candidates.is_empty() {
            return Deduped::default();
        }
        let concurrency = VersionedConfig::get().load().concurrent_limit.dedup_batches.max(1);
        let batches = candidates
            .into_iter()
            .chunks(CHECK_BATCH_SIZE)
            .into_iter()
            .map(|chunk| chunk.collect::<Vec<_>>())
            .collect::<Vec<_>>();
        // buffered 保证结果顺序与批次顺序一致
        let checked = stream::iter(batches)
            .map(|batch| async move {
                let ids = batch.iter().map(|v| v.id.clone()).collect::<Vec<_>>();
                let result = self.store.batch_check_watched(&ids).await;
                (batch, result)
            })
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;
        let mut deduped = Deduped::default();
        let mut last_error = None;
        for (mut batch, result) in checked {
            match result {
                Ok(watched) => {
                    batch.retain(|v| !watched.contains(&v.id));
                    deduped.videos.extend(batch);
                }
                Err(e) => {
                    warn!("检查 {} 个视频的观看记录失败，这些视频将被暂时隐藏：{:#}", batch.len(), e);
                    deduped.unresolved += batch.len();
                    last_error = Some(e);
                }
            }
        }
        if let Some(e) = last_error {
            deduped.failure = Some(FeedError::PartialDedupFailure {
                unresolved: deduped.unresolved,
                message: format!("{:#}", e),
            });
        }
        deduped
    }
}
