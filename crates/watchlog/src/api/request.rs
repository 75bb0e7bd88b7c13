use serde::Deserialize;
use validator::Validate;

use crate::feed::DrainMode;

#[derive(Deserialize, Validate)]
pub struct BrowseRequest {
    /// 播放列表或频道的 id，也可以是 YouTube 链接
    #[validate(length(min = 1, max = 512))]
    pub source: String,
}

#[derive(Deserialize, Validate)]
pub struct DrainModeRequest {
    pub mode: DrainMode,
}

#[derive(Deserialize, Validate)]
pub struct VideoIdsRequest {
    #[validate(length(min = 1, max = 500))]
    pub ids: Vec<String>,
}
