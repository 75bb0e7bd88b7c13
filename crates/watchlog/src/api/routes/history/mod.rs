use std::sync::Arc;

use axum::Router;
use axum::extract::Extension;
use axum::routing::post;

use crate::api::request::VideoIdsRequest;
use crate::api::response::{MarkWatchedResponse, RemoveFromHistoryResponse};
use crate::api::wrapper::{ApiError, ApiResponse, ValidatedJson};
use crate::feed::DrainController;

pub(super) fn router() -> Router {
    Router::new()
        .route("/history/watched", post(mark_watched))
        .route("/history/remove", post(remove_from_history))
}

/// 标记为已观看，视频会立即从当前浏览的列表中移除
pub async fn mark_watched(
    Extension(controller): Extension<Arc<DrainController>>,
    ValidatedJson(request): ValidatedJson<VideoIdsRequest>,
) -> Result<ApiResponse<MarkWatchedResponse>, ApiError> {
    let marked = controller.mark_watched(&request.ids).await;
    Ok(ApiResponse::ok(MarkWatchedResponse {
        marked,
        feed: controller.snapshot(),
    }))
}

/// 从观看记录中移除
pub async fn remove_from_history(
    Extension(controller): Extension<Arc<DrainController>>,
    ValidatedJson(request): ValidatedJson<VideoIdsRequest>,
) -> Result<ApiResponse<RemoveFromHistoryResponse>, ApiError> {
    controller.remove_from_history(&request.ids).await?;
    Ok(ApiResponse::ok(RemoveFromHistoryResponse {
        removed: request.ids.len(),
    }))
}
