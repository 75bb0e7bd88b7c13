use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use itertools::Itertools;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::FeedError;
use crate::feed::dedup::DedupFilter;
use crate::feed::state::{DrainMode, FeedPhase, FeedSnapshot, FeedState, StepOutcome};
use crate::history::{WatchHistory, WatchMark};
use crate::youtube::{PageCursor, PageFetcher, SourceId, VideoRecord};

struct Inner {
    /// 每次切换来源或模式时递增，完成时代数不一致的拉取结果会被丢弃
    generation: u64,
    mode: DrainMode,
    feed: Option<FeedState>,
}

/// 一次拉取步骤的守卫：调用方的 future 在拉取途中被丢弃时，
/// 把仍停留在拉取中的状态恢复为步骤开始前的状态，已累积的页面保持不变
struct StepGuard<'a> {
    controller: &'a DrainController,
    generation: u64,
    previous: (FeedPhase, Option<FeedError>),
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.controller.inner.lock();
        let inner = &mut *guard;
        if inner.generation != self.generation {
            return;
        }
        if let Some(feed) = inner.feed.as_mut()
            && feed.phase.is_fetching()
        {
            let (phase, error) = self.previous.clone();
            warn!("{} 的拉取在完成前被中断，恢复为 {}", feed.source, phase);
            feed.phase = phase;
            feed.error = error;
            self.controller.publish(feed.snapshot());
        }
    }
}

/// 串联拉取与去重，维护当前正在浏览的来源的状态
///
/// 同一时刻只有一个活跃来源；同一来源的页面严格按顺序拉取与追加，
/// 旧一代的拉取允许完成，但结果不会写入新的状态
pub struct DrainController {
    fetcher: Arc<dyn PageFetcher>,
    filter: DedupFilter,
    history: WatchHistory,
    inner: Mutex<Inner>,
    notifier: watch::Sender<FeedSnapshot>,
}

impl DrainController {
    pub fn new(fetcher: Arc<dyn PageFetcher>, history: WatchHistory, mode: DrainMode) -> Self {
        let filter = DedupFilter::new(history.cache().clone(), history.store().clone());
        let (notifier, _) = watch::channel(FeedSnapshot::idle(mode));
        Self {
            fetcher,
            filter,
            history,
            inner: Mutex::new(Inner {
                generation: 0,
                mode,
                feed: None,
            }),
            notifier,
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.notifier.borrow().clone()
    }

    /// 订阅状态变化，只保证能看到最新的状态
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.notifier.subscribe()
    }

    #[cfg(test)]
    pub fn filter(&self) -> &DedupFilter {
        &self.filter
    }

    /// 从第一页开始浏览新的来源，之前的状态（无论是否属于同一来源）都会被丢弃
    pub async fn start_browsing(&self, source: SourceId) -> StepOutcome {
        let generation = {
            let mut inner = self.inner.lock();
            self.restart(&mut inner, source.clone())
        };
        info!("开始浏览 {}", source);
        let _step = self.step(generation, (FeedPhase::Idle, None));
        self.drive(generation, source, None).await
    }

    /// 从保存的游标继续拉取；上一步出错时，以相同游标重试
    pub async fn load_more(&self) -> StepOutcome {
        let (generation, source, cursor, previous) = {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            let Some(feed) = inner.feed.as_mut() else {
                return StepOutcome::Idle;
            };
            if feed.phase.is_fetching() {
                return StepOutcome::Busy;
            }
            if !feed.has_more() {
                return StepOutcome::Exhausted;
            }
            let previous = (feed.phase, feed.error.take());
            feed.phase = if feed.pages_loaded == 0 {
                FeedPhase::FetchingFirstPage
            } else {
                FeedPhase::FetchingMore
            };
            self.publish(feed.snapshot());
            (generation, feed.source.clone(), feed.cursor.clone(), previous)
        };
        let _step = self.step(generation, previous);
        self.drive(generation, source, cursor).await
    }

    /// 切换翻页策略，若正在浏览某个来源则从第一页重新开始
    pub async fn set_drain_mode(&self, mode: DrainMode) -> StepOutcome {
        let restarted = {
            let mut inner = self.inner.lock();
            if inner.mode == mode {
                return StepOutcome::Unchanged;
            }
            inner.mode = mode;
            match inner.feed.as_ref().map(|feed| feed.source.clone()) {
                Some(source) => Some((self.restart(&mut inner, source.clone()), source)),
                None => {
                    self.publish(FeedSnapshot::idle(mode));
                    None
                }
            }
        };
        info!("翻页策略已切换为 {}", mode);
        match restarted {
            Some((generation, source)) => {
                let _step = self.step(generation, (FeedPhase::Idle, None));
                self.drive(generation, source, None).await
            }
            None => StepOutcome::Idle,
        }
    }

    /// 标记为已观看：先从可见序列中移除并写入本地缓存，再写入远端，返回标记的数量
    pub async fn mark_watched(&self, video_ids: &[String]) -> usize {
        let now = Utc::now();
        let marks = {
            let mut inner = self.inner.lock();
            let wanted = video_ids.iter().map(String::as_str).collect::<HashSet<_>>();
            let mut videos = match inner.feed.as_mut() {
                Some(feed) => feed.take(&wanted),
                None => Vec::new(),
            };
            let found = videos.iter().map(|v| v.id.clone()).collect::<HashSet<_>>();
            videos.extend(
                video_ids
                    .iter()
                    .unique()
                    .filter(|id| !found.contains(*id))
                    .map(VideoRecord::bare),
            );
            let marks = videos
                .into_iter()
                .map(|video| WatchMark::new(video, now))
                .collect::<Vec<_>>();
            // 本地缓存必须在锁内写入，否则正在进行的拉取可能把刚移除的视频重新追加进来
            self.history.mark_local(&marks);
            if let Some(feed) = inner.feed.as_ref() {
                self.publish(feed.snapshot());
            }
            marks
        };
        let count = marks.len();
        self.history.persist_remote(marks).await;
        count
    }

    /// 从观看记录中移除，被移除的视频会在之后的拉取中重新出现
    pub async fn remove_from_history(&self, video_ids: &[String]) -> Result<()> {
        self.history.remove_watched(video_ids).await
    }

    fn restart(&self, inner: &mut Inner, source: SourceId) -> u64 {
        inner.generation += 1;
        let feed = FeedState::new(source, inner.mode);
        self.publish(feed.snapshot());
        inner.feed = Some(feed);
        inner.generation
    }

    fn step(&self, generation: u64, previous: (FeedPhase, Option<FeedError>)) -> StepGuard<'_> {
        StepGuard {
            controller: self,
            generation,
            previous,
        }
    }

    fn publish(&self, snapshot: FeedSnapshot) {
        self.notifier.send_replace(snapshot);
    }

    /// 从 `cursor` 开始拉取，部分模式拉取一页后返回，全量模式拉取到没有下一页为止
    async fn drive(&self, generation: u64, source: SourceId, mut cursor: Option<PageCursor>) -> StepOutcome {
        loop {
            let fetched = match self.fetcher.fetch_page(&source, cursor.as_ref()).await {
                Ok(page) => Ok((self.filter.filter_unwatched(page.videos).await, page.next_cursor)),
                Err(e) => Err(e),
            };
            let outcome = {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;
                let feed = match inner.feed.as_mut() {
                    Some(feed) if inner.generation == generation => feed,
                    _ => {
                        debug!("{} 的拉取结果已过期，丢弃", source);
                        return StepOutcome::Discarded;
                    }
                };
                let (deduped, next_cursor) = match fetched {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        let page = feed.pages_loaded + 1;
                        if e.is_fatal() {
                            error!("拉取 {} 的第 {} 页失败，重试没有意义：{:#}", source, page, e);
                        } else if e.is_transient() {
                            warn!("拉取 {} 的第 {} 页失败，可以稍后重试：{:#}", source, page, e);
                        } else {
                            error!("拉取 {} 的第 {} 页失败：{:#}", source, page, e);
                        }
                        feed.phase = FeedPhase::Error;
                        feed.error = Some(e);
                        self.publish(feed.snapshot());
                        return StepOutcome::Failed;
                    }
                };
                // 拉取期间可能有视频被标记为已观看
                let videos = self.history.cache().retain_unwatched(deduped.videos);
                let appended = feed.append(videos);
                feed.pages_loaded += 1;
                feed.unresolved += deduped.unresolved;
                if let Some(failure) = deduped.failure {
                    feed.dedup_warning = Some(failure);
                }
                feed.cursor = next_cursor;
                debug!("{} 的第 {} 页追加了 {} 个未观看的视频", source, feed.pages_loaded, appended);
                let outcome = match (&feed.cursor, feed.mode) {
                    (None, _) => {
                        feed.phase = FeedPhase::Exhausted;
                        info!("{} 已拉取完毕，共 {} 个未观看的视频", source, feed.videos.len());
                        Some(StepOutcome::Exhausted)
                    }
                    (Some(_), DrainMode::Partial) => {
                        feed.phase = FeedPhase::Ready;
                        Some(StepOutcome::Ready)
                    }
                    (Some(_), DrainMode::Eager) => {
                        feed.phase = FeedPhase::FetchingMore;
                        cursor = feed.cursor.clone();
                        None
                    }
                };
                self.publish(feed.snapshot());
                outcome
            };
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }
}
