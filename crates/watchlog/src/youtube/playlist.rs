use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::config::VersionedConfig;
use crate::error::FeedError;
use crate::youtube::client::validate_response;
use crate::youtube::{
    Page, PageCursor, PageFetcher, SourceId, VideoRecord, YouTubeClient, YouTubeError, ensure_cursor_belongs, watch_url,
};

/// 单页最多返回的条目数，由 Data API 限定
pub const MAX_PAGE_SIZE: u32 = 50;

// 视频被删除或设为私享后仍会留在列表中，但已无法播放
const UNAVAILABLE_TITLES: [&str; 2] = ["Deleted video", "Private video"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: Option<Snippet>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    video_owner_channel_title: Option<String>,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: Option<String>,
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    #[serde(default)]
    width: u32,
}

impl PlaylistItem {
    fn into_record(self) -> Option<VideoRecord> {
        let snippet = self.snippet?;
        let content_details = self.content_details;
        let id = content_details
            .as_ref()
            .and_then(|c| c.video_id.clone())
            .or_else(|| snippet.resource_id.and_then(|r| r.video_id))?;
        if id.is_empty() || UNAVAILABLE_TITLES.contains(&snippet.title.as_str()) {
            return None;
        }
        // 优先取视频本身的发布时间，私享视频没有该字段时退化为加入列表的时间
        let published_at = content_details
            .and_then(|c| c.video_published_at)
            .or(snippet.published_at);
        let thumbnail_url = ["maxres", "standard", "high", "medium", "default"]
            .iter()
            .find_map(|key| snippet.thumbnails.get(*key))
            .or_else(|| snippet.thumbnails.values().max_by_key(|t| t.width))
            .map(|t| t.url.clone())
            .unwrap_or_default();
        Some(VideoRecord {
            source_url: watch_url(&id),
            id,
            title: snippet.title,
            thumbnail_url,
            channel_title: snippet.video_owner_channel_title.unwrap_or(snippet.channel_title),
            published_at,
        })
    }
}

/// 将 playlistItems 的响应转换为一页视频，游标绑定到发起请求的来源上
pub(super) fn parse_page(body: Value, source: &SourceId) -> Result<Page, YouTubeError> {
    let response: PlaylistItemsResponse =
        serde_json::from_value(body).map_err(|e| YouTubeError::InvalidResponse(e.to_string()))?;
    let videos = response
        .items
        .into_iter()
        .filter_map(PlaylistItem::into_record)
        .collect();
    let next_cursor = response
        .next_page_token
        .filter(|token| !token.is_empty())
        .map(|token| PageCursor {
            token,
            source: source.clone(),
        });
    Ok(Page { videos, next_cursor })
}

impl YouTubeClient {
    async fn get_playlist_items(&self, source: &SourceId, cursor: Option<&PageCursor>) -> Result<Value, YouTubeError> {
        let (api_key, page_size) = {
            let config = VersionedConfig::get().load();
            (config.api_key.clone(), config.page_size.clamp(1, MAX_PAGE_SIZE))
        };
        if api_key.is_empty() {
            return Err(YouTubeError::MissingApiKey);
        }
        let mut request = self.request(Method::GET, "/playlistItems").await.query(&[
            ("part", "snippet,contentDetails"),
            ("playlistId", source.playlist_id().as_ref()),
            ("maxResults", page_size.to_string().as_str()),
            ("key", api_key.as_str()),
        ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("pageToken", cursor.token.as_str())]);
        }
        validate_response(request.send().await?).await
    }
}

#[async_trait]
impl PageFetcher for YouTubeClient {
    async fn fetch_page(&self, source: &SourceId, cursor: Option<&PageCursor>) -> Result<Page, FeedError> {
        ensure_cursor_belongs(source, cursor)?;
        let body = self.get_playlist_items(source, cursor).await.inspect_err(|e| {
            warn!("获取 {} 的视频列表失败：{:#}", source, e);
        })?;
        let page = parse_page(body, source)?;
        debug!(
            "获取 {} 的一页视频完成，共 {} 条，{}",
            source,
            page.videos.len(),
            if page.next_cursor.is_some() { "仍有下一页" } else { "已是最后一页" }
        );
        Ok(page)
    }
}
