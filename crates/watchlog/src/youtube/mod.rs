use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use client::YouTubeClient;
pub use error::YouTubeError;
use serde::{Deserialize, Serialize};
pub use source::SourceId;

use crate::error::FeedError;

mod client;
mod error;
mod playlist;
mod source;

/// 播放列表或频道上传列表中的一条视频，`id` 是唯一的去重依据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_url: String,
}

impl VideoRecord {
    /// 仅知道 id 的视频（例如直接按 id 标记已观看），其余字段留空
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source_url: watch_url(&id),
            id,
            title: String::new(),
            thumbnail_url: String::new(),
            channel_title: String::new(),
            published_at: None,
        }
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// 续页游标，只对产生它的来源有效
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub token: String,
    pub source: SourceId,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub videos: Vec<VideoRecord>,
    /// 为 None 表示已经是最后一页
    pub next_cursor: Option<PageCursor>,
}

/// 拉取某个来源的一页视频，每次调用恰好对应一次网络请求，不做缓存也不做重试
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, source: &SourceId, cursor: Option<&PageCursor>) -> Result<Page, FeedError>;
}

/// 拒绝不属于当前来源的游标
pub(crate) fn ensure_cursor_belongs(source: &SourceId, cursor: Option<&PageCursor>) -> Result<(), FeedError> {
    match cursor {
        Some(cursor) if cursor.source != *source => Err(FeedError::InvalidSource(format!(
            "cursor produced by {} cannot be used for {}",
            cursor.source, source
        ))),
        _ => Ok(()),
    }
}
