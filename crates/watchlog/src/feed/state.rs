use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::FeedError;
use crate::youtube::{PageCursor, SourceId, VideoRecord};

/// 翻页策略
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DrainMode {
    /// 每次“加载更多”只拉取一页
    #[default]
    Partial,
    /// 自动拉取直到没有下一页
    Eager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedPhase {
    Idle,
    FetchingFirstPage,
    Ready,
    FetchingMore,
    Exhausted,
    Error,
}

impl FeedPhase {
    pub fn is_fetching(self) -> bool {
        matches!(self, FeedPhase::FetchingFirstPage | FeedPhase::FetchingMore)
    }
}

/// 对外发布的只读视图，每次状态变化时整体替换
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub source: Option<SourceId>,
    pub videos: Vec<VideoRecord>,
    pub phase: FeedPhase,
    pub mode: DrainMode,
    pub has_more: bool,
    pub is_fetching_more: bool,
    pub error: Option<FeedError>,
    /// 部分去重批次失败时的提示，不影响继续翻页
    pub dedup_warning: Option<FeedError>,
    /// 因去重失败而被隐藏的视频累计数量
    pub unresolved: usize,
    pub pages_loaded: usize,
}

impl FeedSnapshot {
    pub fn idle(mode: DrainMode) -> Self {
        Self {
            source: None,
            videos: Vec::new(),
            phase: FeedPhase::Idle,
            mode,
            has_more: false,
            is_fetching_more: false,
            error: None,
            dedup_warning: None,
            unresolved: 0,
            pages_loaded: 0,
        }
    }
}

/// 某一来源累积的浏览状态，只属于创建它的那一代
pub(super) struct FeedState {
    pub source: SourceId,
    pub mode: DrainMode,
    pub videos: Vec<VideoRecord>,
    // 已展示过的 id，防止同一视频在不同页重复出现
    seen: HashSet<String>,
    pub cursor: Option<PageCursor>,
    pub pages_loaded: usize,
    pub phase: FeedPhase,
    pub error: Option<FeedError>,
    pub dedup_warning: Option<FeedError>,
    pub unresolved: usize,
}

impl FeedState {
    pub fn new(source: SourceId, mode: DrainMode) -> Self {
        Self {
            source,
            mode,
            videos: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
            pages_loaded: 0,
            phase: FeedPhase::FetchingFirstPage,
            error: None,
            dedup_warning: None,
            unresolved: 0,
        }
    }

    /// 还没拉取过任何一页，或者最后一页给出了游标
    pub fn has_more(&self) -> bool {
        self.pages_loaded == 0 || self.cursor.is_some()
    }

    /// 追加一页去重后的视频，跳过已经展示过的，返回实际追加的数量
    pub fn append(&mut self, videos: Vec<VideoRecord>) -> usize {
        let before = self.videos.len();
        for video in videos {
            if self.seen.insert(video.id.clone()) {
                self.videos.push(video);
            }
        }
        self.videos.len() - before
    }

    /// 从可见序列中移除并返回指定的视频，保持剩余视频的顺序
    pub fn take(&mut self, video_ids: &HashSet<&str>) -> Vec<VideoRecord> {
        let (taken, kept) = std::mem::take(&mut self.videos)
            .into_iter()
            .partition(|v| video_ids.contains(v.id.as_str()));
        self.videos = kept;
        taken
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            source: Some(self.source.clone()),
            videos: self.videos.clone(),
            phase: self.phase,
            mode: self.mode,
            has_more: self.has_more(),
            is_fetching_more: self.phase.is_fetching(),
            error: self.error.clone(),
            dedup_warning: self.dedup_warning.clone(),
            unresolved: self.unresolved,
            pages_loaded: self.pages_loaded,
        }
    }
}

/// 一次控制器操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepOutcome {
    /// 已有结果可以展示，仍有下一页
    Ready,
    /// 已没有下一页
    Exhausted,
    /// 已有拉取正在进行，本次调用被拒绝
    Busy,
    /// 完成时已经切换了来源或模式，结果被丢弃
    Discarded,
    /// 当前没有正在浏览的来源
    Idle,
    /// 模式没有变化，什么都没做
    Unchanged,
    /// 出错，错误信息保存在状态中
    Failed,
}
