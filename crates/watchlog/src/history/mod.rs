mod local;
mod remote;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
pub use local::LocalWatchCache;
pub use remote::{CHECK_BATCH_SIZE, DatabaseWatchStore, WatchStore};
use serde::{Deserialize, Serialize};

use crate::youtube::VideoRecord;

/// “该视频已观看”这一事实，可以比产生它的 [`VideoRecord`] 存活得更久
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchMark {
    pub video: VideoRecord,
    pub watched_at: DateTime<Utc>,
}

impl WatchMark {
    pub fn new(video: VideoRecord, watched_at: DateTime<Utc>) -> Self {
        Self { video, watched_at }
    }
}

/// 观看记录的两级存储：先写本地缓存，再写远端
#[derive(Clone)]
pub struct WatchHistory {
    cache: Arc<LocalWatchCache>,
    store: Arc<dyn WatchStore>,
    // 串行化所有远端写入，避免重试中的旧记录覆盖之后的删除
    sync_lock: Arc<tokio::sync::Mutex<()>>,
}

impl WatchHistory {
    pub fn new(cache: Arc<LocalWatchCache>, store: Arc<dyn WatchStore>) -> Self {
        Self {
            cache,
            store,
            sync_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn cache(&self) -> &Arc<LocalWatchCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn WatchStore> {
        &self.store
    }

    /// 同步写入本地缓存的内存部分，返回新增的数量，落盘在 [`Self::persist_remote`] 中完成
    pub fn mark_local(&self, marks: &[WatchMark]) -> usize {
        self.cache.insert(marks.iter().map(|m| m.video.id.as_str()))
    }

    /// 本地落盘后写入远端，失败时不回滚本地标记，而是放入待同步队列等待下次 [`Self::reconcile`]
    pub async fn persist_remote(&self, marks: Vec<WatchMark>) {
        if marks.is_empty() {
            return;
        }
        self.flush_local().await;
        let _lock = self.sync_lock.lock().await;
        if let Err(e) = self.store.record_watched(&marks).await {
            warn!("写入 {} 条远端观看记录失败，已加入待同步队列：{:#}", marks.len(), e);
            self.cache.enqueue_pending(marks);
            self.flush_local().await;
        }
    }

    #[cfg(test)]
    pub async fn mark_watched(&self, marks: Vec<WatchMark>) {
        self.mark_local(&marks);
        self.persist_remote(marks).await;
    }

    /// 同时从本地与远端删除，远端删除失败时返回错误，本地删除已生效
    pub async fn remove_watched(&self, video_ids: &[String]) -> Result<()> {
        if video_ids.is_empty() {
            return Ok(());
        }
        let _lock = self.sync_lock.lock().await;
        self.cache.remove(video_ids);
        self.cache.flush().await?;
        self.store.remove_watched(video_ids).await?;
        info!("已从观看记录中移除 {} 个视频", video_ids.len());
        Ok(())
    }

    /// 重试写入待同步队列中的记录，返回成功同步的数量
    pub async fn reconcile(&self) -> Result<usize> {
        let _lock = self.sync_lock.lock().await;
        let pending = self.cache.pending();
        if pending.is_empty() {
            return Ok(0);
        }
        self.store.record_watched(&pending).await?;
        let synced = pending.iter().map(|m| m.video.id.as_str()).collect::<HashSet<_>>();
        self.cache.clear_pending(&synced);
        self.cache.flush().await?;
        info!("已同步 {} 条待同步的观看记录", synced.len());
        Ok(synced.len())
    }

    async fn flush_local(&self) {
        if let Err(e) = self.cache.flush().await {
            error!("保存本地观看记录失败：{:#}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use super::*;

    /// 内存中的远端存储，记录每次批量检查的大小，可以让指定的批次或写入失败
    #[derive(Default)]
    pub struct FakeStore {
        pub watched: Mutex<HashSet<String>>,
        pub check_sizes: Mutex<Vec<usize>>,
        /// 第 n 次批量检查（从 0 开始）失败
        pub failing_checks: Mutex<HashSet<usize>>,
        pub fail_writes: AtomicBool,
        /// 设置后每次写入都要先取得一个许可
        pub write_gate: Mutex<Option<Arc<Semaphore>>>,
        pub writes_started: AtomicUsize,
        checks: AtomicUsize,
    }

    impl FakeStore {
        pub fn with_watched<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
            let store = Self::default();
            store.watched.lock().extend(ids.into_iter().map(ToOwned::to_owned));
            store
        }

        pub fn check_sizes(&self) -> Vec<usize> {
            self.check_sizes.lock().clone()
        }
    }

    #[async_trait]
    impl WatchStore for FakeStore {
        async fn batch_check_watched(&self, video_ids: &[String]) -> Result<HashSet<String>> {
            assert!(video_ids.len() <= CHECK_BATCH_SIZE);
            let nth = self.checks.fetch_add(1, Ordering::SeqCst);
            self.check_sizes.lock().push(video_ids.len());
            if self.failing_checks.lock().contains(&nth) {
                bail!("connection reset by peer");
            }
            let watched = self.watched.lock();
            Ok(video_ids.iter().filter(|id| watched.contains(*id)).cloned().collect())
        }

        async fn record_watched(&self, marks: &[WatchMark]) -> Result<()> {
            self.writes_started.fetch_add(1, Ordering::SeqCst);
            let gate = self.write_gate.lock().clone();
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!("database is locked");
            }
            self.watched.lock().extend(marks.iter().map(|m| m.video.id.clone()));
            Ok(())
        }

        async fn remove_watched(&self, video_ids: &[String]) -> Result<()> {
            let mut watched = self.watched.lock();
            for id in video_ids {
                watched.remove(id);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::sync::Semaphore;

    use super::testing::FakeStore;
    use super::*;

    fn marks(ids: &[&str]) -> Vec<WatchMark> {
        let now = Utc::now();
        ids.iter().map(|id| WatchMark::new(VideoRecord::bare(*id), now)).collect()
    }

    #[tokio::test]
    async fn test_mark_watched_writes_both() {
        let store = Arc::new(FakeStore::default());
        let history = WatchHistory::new(Arc::new(LocalWatchCache::in_memory()), store.clone());
        history.mark_watched(marks(&["a", "b"])).await;
        // 重复标记是无操作
        history.mark_watched(marks(&["b"])).await;
        assert!(history.cache().contains("a"));
        assert_eq!(store.watched.lock().len(), 2);
        assert!(history.cache().pending().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_and_reconciles() {
        let store = Arc::new(FakeStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let history = WatchHistory::new(Arc::new(LocalWatchCache::in_memory()), store.clone());
        history.mark_watched(marks(&["a", "b"])).await;
        assert!(history.cache().contains("a"));
        assert!(store.watched.lock().is_empty());
        assert_eq!(history.cache().pending().len(), 2);
        assert!(history.reconcile().await.is_err());

        store.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(history.reconcile().await.unwrap(), 2);
        assert!(history.cache().pending().is_empty());
        assert_eq!(store.watched.lock().len(), 2);
        assert_eq!(history.reconcile().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_watched() {
        let store = Arc::new(FakeStore::default());
        let history = WatchHistory::new(Arc::new(LocalWatchCache::in_memory()), store.clone());
        history.mark_watched(marks(&["a", "b"])).await;
        history.remove_watched(&["a".to_owned()]).await.unwrap();
        assert!(!history.cache().contains("a"));
        assert!(history.cache().contains("b"));
        assert!(!store.watched.lock().contains("a"));
    }

    #[tokio::test]
    async fn test_remove_during_reconcile_is_not_undone() {
        let store = Arc::new(FakeStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let history = WatchHistory::new(Arc::new(LocalWatchCache::in_memory()), store.clone());
        history.mark_watched(marks(&["a", "b"])).await;
        assert_eq!(history.cache().pending().len(), 2);

        store.fail_writes.store(false, Ordering::SeqCst);
        let gate = Arc::new(Semaphore::new(0));
        *store.write_gate.lock() = Some(gate.clone());
        let writes_before = store.writes_started.load(Ordering::SeqCst);
        let reconcile = tokio::spawn({
            let history = history.clone();
            async move { history.reconcile().await }
        });
        while store.writes_started.load(Ordering::SeqCst) == writes_before {
            tokio::task::yield_now().await;
        }
        // 重试写入进行中时发起删除
        let remove = tokio::spawn({
            let history = history.clone();
            async move { history.remove_watched(&["a".to_owned()]).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.add_permits(1);
        assert_eq!(reconcile.await.unwrap().unwrap(), 2);
        remove.await.unwrap().unwrap();

        assert!(!store.watched.lock().contains("a"));
        assert!(store.watched.lock().contains("b"));
        assert!(!history.cache().contains("a"));
        assert!(history.cache().pending().is_empty());
    }
}
