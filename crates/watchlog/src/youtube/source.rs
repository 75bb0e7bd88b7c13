use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FeedError;

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{22}$").expect("invalid channel id regex"));

// WL（稍后再看）和 RD（自动合辑）无法通过 Data API 分页读取，不在支持范围内
static PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:PL|UU|FL|OL|LL)[A-Za-z0-9_-]{10,62}$").expect("invalid playlist id regex"));

/// 正在浏览的视频来源：播放列表或频道的上传列表
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Playlist(String),
    Channel(String),
}

impl SourceId {
    /// 从裸 id 或常见的 YouTube 链接中解析来源，不合法的输入在发出任何请求前即返回 `InvalidSource`
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FeedError::InvalidSource("empty source".to_owned()));
        }
        if let Some(id) = raw.strip_prefix("playlist:") {
            return Self::playlist(id);
        }
        if let Some(id) = raw.strip_prefix("channel:") {
            return Self::channel(id);
        }
        if raw.starts_with('@') {
            return Err(FeedError::InvalidSource(format!(
                "channel handle {raw} must be resolved to a channel id first"
            )));
        }
        if raw.contains("youtube.com") || raw.contains("youtu.be") {
            return Self::parse_url(raw);
        }
        if CHANNEL_ID.is_match(raw) {
            return Ok(SourceId::Channel(raw.to_owned()));
        }
        Self::playlist(raw)
    }

    fn parse_url(raw: &str) -> Result<Self, FeedError> {
        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            Cow::Borrowed(raw)
        } else {
            Cow::Owned(format!("https://{raw}"))
        };
        let url = Url::parse(&with_scheme).map_err(|e| FeedError::InvalidSource(format!("{raw}: {e}")))?;
        let host = url.host_str().unwrap_or_default();
        if !(host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")) {
            return Err(FeedError::InvalidSource(format!("{raw} is not a youtube url")));
        }
        if let Some((_, list)) = url.query_pairs().find(|(key, _)| key == "list") {
            return Self::playlist(&list);
        }
        let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
        match (segments.next(), segments.next()) {
            (Some("channel"), Some(id)) => Self::channel(id),
            (Some(segment), _) if segment.starts_with('@') => Err(FeedError::InvalidSource(format!(
                "channel handle {segment} must be resolved to a channel id first"
            ))),
            _ => Err(FeedError::InvalidSource(format!(
                "{raw} does not reference a playlist or a channel"
            ))),
        }
    }

    fn playlist(id: &str) -> Result<Self, FeedError> {
        if PLAYLIST_ID.is_match(id) {
            Ok(SourceId::Playlist(id.to_owned()))
        } else {
            Err(FeedError::InvalidSource(format!("malformed playlist id {id}")))
        }
    }

    fn channel(id: &str) -> Result<Self, FeedError> {
        if CHANNEL_ID.is_match(id) {
            Ok(SourceId::Channel(id.to_owned()))
        } else {
            Err(FeedError::InvalidSource(format!("malformed channel id {id}")))
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SourceId::Playlist(id) | SourceId::Channel(id) => id,
        }
    }

    /// 实际用于请求 playlistItems 的播放列表 id，频道会被映射为其上传列表（UC… -> UU…）
    pub fn playlist_id(&self) -> Cow<'_, str> {
        match self {
            SourceId::Playlist(id) => Cow::Borrowed(id),
            SourceId::Channel(id) => Cow::Owned(format!("UU{}", id.strip_prefix("UC").unwrap_or(id))),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Playlist(id) => write!(f, "playlist:{id}"),
            SourceId::Channel(id) => write!(f, "channel:{id}"),
        }
    }
}

impl FromStr for SourceId {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "UC_x5XG1OV2P6uZZ5FSM9Ttw";
    const PLAYLIST: &str = "PLBCF2DAC6FFB574DE";

    #[test]
    fn test_parse_bare_ids() {
        assert_eq!(SourceId::parse(CHANNEL).unwrap(), SourceId::Channel(CHANNEL.to_owned()));
        assert_eq!(SourceId::parse(PLAYLIST).unwrap(), SourceId::Playlist(PLAYLIST.to_owned()));
        assert_eq!(
            SourceId::parse(&format!("  {PLAYLIST}\n")).unwrap(),
            SourceId::Playlist(PLAYLIST.to_owned())
        );
    }

    #[test]
    fn test_parse_urls() {
        let testcases = [
            (
                format!("https://www.youtube.com/playlist?list={PLAYLIST}"),
                SourceId::Playlist(PLAYLIST.to_owned()),
            ),
            (
                format!("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list={PLAYLIST}&index=2"),
                SourceId::Playlist(PLAYLIST.to_owned()),
            ),
            (
                format!("youtube.com/channel/{CHANNEL}/videos"),
                SourceId::Channel(CHANNEL.to_owned()),
            ),
            (
                format!("https://m.youtube.com/channel/{CHANNEL}"),
                SourceId::Channel(CHANNEL.to_owned()),
            ),
        ];
        for (raw, expected) in testcases {
            assert_eq!(SourceId::parse(&raw).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "",
            "   ",
            "@GoogleDevelopers",
            "https://www.youtube.com/@GoogleDevelopers",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://example.com/playlist?list=PLBCF2DAC6FFB574DE",
            "https://www.youtube.com/playlist?list=WL",
            "PL short",
            "UCtooshort",
            "channel:PLBCF2DAC6FFB574DE",
        ] {
            assert!(
                matches!(SourceId::parse(raw), Err(FeedError::InvalidSource(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_channel_maps_to_uploads() {
        let channel = SourceId::Channel(CHANNEL.to_owned());
        assert_eq!(channel.playlist_id(), "UU_x5XG1OV2P6uZZ5FSM9Ttw");
        let playlist = SourceId::Playlist(PLAYLIST.to_owned());
        assert_eq!(playlist.playlist_id(), PLAYLIST);
    }

    #[test]
    fn test_display_parses_back() {
        for source in [
            SourceId::Channel(CHANNEL.to_owned()),
            SourceId::Playlist(PLAYLIST.to_owned()),
        ] {
            assert_eq!(source.to_string().parse::<SourceId>().unwrap(), source);
        }
        let json = serde_json::to_string(&SourceId::Channel(CHANNEL.to_owned())).unwrap();
        assert_eq!(json, format!("\"channel:{CHANNEL}\""));
    }
}
