use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::api::wrapper::{ApiError, ApiResponse};
use crate::config::{Config, VersionedConfig};

pub(super) fn router() -> Router {
    Router::new().route("/config", get(get_config).put(update_config))
}

/// 获取全局配置
pub async fn get_config() -> Result<ApiResponse<Arc<Config>>, ApiError> {
    Ok(ApiResponse::ok(VersionedConfig::get().load_full()))
}

/// 更新全局配置，需要携带当前的 version
pub async fn update_config(Json(config): Json<Config>) -> Result<ApiResponse<Arc<Config>>, ApiError> {
    let new_config = VersionedConfig::get().update(config).await?;
    Ok(ApiResponse::ok(new_config))
}
