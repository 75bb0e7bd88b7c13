use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::history::WatchMark;
use crate::youtube::VideoRecord;

#[derive(Default)]
struct CacheData {
    watched: HashSet<String>,
    /// 已写入本地但尚未成功写入远端的记录
    pending: Vec<WatchMark>,
}

#[derive(Serialize, Deserialize, Default)]
struct CacheFile {
    #[serde(default)]
    watched: Vec<String>,
    #[serde(default)]
    pending: Vec<WatchMark>,
}

/// 本地的已观看 id 集合，进程内共享；修改只作用于内存，由调用方在锁外落盘
///
/// 读取永远是同步的全量读取；写入只做追加与删除，不会整体回滚
pub struct LocalWatchCache {
    path: Option<PathBuf>,
    data: RwLock<CacheData>,
    // 保证落盘顺序与内存修改顺序一致
    write_lock: Mutex<()>,
}

impl LocalWatchCache {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(CacheData::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// 从文件加载，每个会话只加载一次；文件不存在时为空，文件损坏时丢弃并重新开始
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) => {
                    info!(
                        "加载本地观看记录 {}：{} 条已观看，{} 条待同步",
                        path.display(),
                        file.watched.len(),
                        file.pending.len()
                    );
                    CacheData {
                        watched: file.watched.into_iter().collect(),
                        pending: file.pending,
                    }
                }
                Err(e) => {
                    warn!("本地观看记录 {} 已损坏：{}，将重新开始记录", path.display(), e);
                    CacheData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("本地观看记录 {} 不存在，将重新开始记录", path.display());
                CacheData::default()
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
        })
    }

    #[cfg(test)]
    pub fn contains(&self, video_id: &str) -> bool {
        self.data.read().watched.contains(video_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.read().watched.len()
    }

    /// 仅保留本地未标记为已观看的视频，保持原有顺序
    pub fn retain_unwatched(&self, mut videos: Vec<VideoRecord>) -> Vec<VideoRecord> {
        let data = self.data.read();
        videos.retain(|v| !data.watched.contains(&v.id));
        videos
    }

    /// 追加已观看 id，重复标记是无操作，返回新增的数量；只修改内存，落盘见 [`Self::flush`]
    pub fn insert<'a>(&self, video_ids: impl IntoIterator<Item = &'a str>) -> usize {
        let mut data = self.data.write();
        video_ids
            .into_iter()
            .filter(|id| data.watched.insert((*id).to_owned()))
            .count()
    }

    /// 删除已观看 id，同时丢弃对应的待同步记录
    pub fn remove(&self, video_ids: &[String]) {
        let mut data = self.data.write();
        for id in video_ids {
            data.watched.remove(id);
        }
        data.pending.retain(|m| !video_ids.contains(&m.video.id));
    }

    /// 将远端写入失败的记录放入待同步队列，同一视频只保留一条
    pub fn enqueue_pending(&self, marks: Vec<WatchMark>) {
        let mut data = self.data.write();
        for mark in marks {
            if !data.pending.iter().any(|m| m.video.id == mark.video.id) {
                data.pending.push(mark);
            }
        }
    }

    pub fn pending(&self) -> Vec<WatchMark> {
        self.data.read().pending.clone()
    }

    pub fn clear_pending(&self, video_ids: &HashSet<&str>) {
        self.data.write().pending.retain(|m| !video_ids.contains(m.video.id.as_str()));
    }

    /// 在阻塞线程池中把当前的完整内容写入文件
    pub async fn flush(self: &Arc<Self>) -> Result<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.persist())
            .await
            .context("watch cache writer panicked")?
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // 在写锁内读取内存，后写入的一方总是带着更新的内容
        let _guard = self.write_lock.lock();
        let file = {
            let data = self.data.read();
            let mut watched = data.watched.iter().cloned().collect::<Vec<_>>();
            watched.sort_unstable();
            CacheFile {
                watched,
                pending: data.pending.clone(),
            }
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // 先写临时文件再替换，避免写到一半时退出导致文件损坏
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(&file)?)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path).with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn video(id: &str) -> VideoRecord {
        VideoRecord::bare(id)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let cache = LocalWatchCache::in_memory();
        assert_eq!(cache.insert(["a", "b"]), 2);
        assert_eq!(cache.insert(["b", "c"]), 1);
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("a"));
        assert!(!cache.contains("d"));
    }

    #[test]
    fn test_retain_unwatched_keeps_order() {
        let cache = LocalWatchCache::in_memory();
        cache.insert(["b", "d"]);
        let left = cache.retain_unwatched(["a", "b", "c", "d", "e"].into_iter().map(video).collect());
        assert_eq!(left.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(), ["a", "c", "e"]);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watch_cache.json");
        let cache = Arc::new(LocalWatchCache::load(&path).unwrap());
        assert_eq!(cache.len(), 0);
        cache.insert(["x", "y"]);
        cache.enqueue_pending(vec![WatchMark::new(video("y"), Utc::now())]);
        cache.remove(&["x".to_owned()]);
        // 落盘之前文件还不存在
        assert!(!path.exists());
        cache.flush().await.unwrap();
        let reloaded = Arc::new(LocalWatchCache::load(&path).unwrap());
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("y"));
        assert_eq!(reloaded.pending().len(), 1);
        reloaded.clear_pending(&HashSet::from(["y"]));
        reloaded.flush().await.unwrap();
        assert!(LocalWatchCache::load(&path).unwrap().pending().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_flushes_keep_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch_cache.json");
        let cache = Arc::new(LocalWatchCache::load(&path).unwrap());
        let flushes = (0..20)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache.insert([format!("v{i}").as_str()]);
                    cache.flush().await
                })
            })
            .collect::<Vec<_>>();
        for flush in flushes {
            flush.await.unwrap().unwrap();
        }
        assert_eq!(LocalWatchCache::load(&path).unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_corrupted_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch_cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = Arc::new(LocalWatchCache::load(&path).unwrap());
        assert_eq!(cache.len(), 0);
        cache.insert(["z"]);
        cache.flush().await.unwrap();
        assert!(LocalWatchCache::load(&path).unwrap().contains("z"));
    }

    #[test]
    fn test_pending_deduplicated_and_removed() {
        let cache = LocalWatchCache::in_memory();
        let now = Utc::now();
        cache.enqueue_pending(vec![WatchMark::new(video("a"), now), WatchMark::new(video("b"), now)]);
        cache.enqueue_pending(vec![WatchMark::new(video("a"), now)]);
        assert_eq!(cache.pending().len(), 2);
        cache.remove(&["a".to_owned()]);
        assert_eq!(
            cache.pending().iter().map(|m| m.video.id.as_str()).collect::<Vec<_>>(),
            ["b"]
        );
    }
}
