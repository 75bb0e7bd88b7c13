use std::sync::Arc;

use axum::Router;
use axum::extract::Extension;
use axum::routing::{get, post};

use crate::api::error::InnerApiError;
use crate::api::request::{BrowseRequest, DrainModeRequest};
use crate::api::response::FeedResponse;
use crate::api::wrapper::{ApiError, ApiResponse, ValidatedJson, feed_error_status};
use crate::feed::{DrainController, FeedSnapshot, StepOutcome};
use crate::youtube::SourceId;

pub(super) fn router() -> Router {
    Router::new()
        .route("/feed", get(get_feed))
        .route("/feed/browse", post(browse))
        .route("/feed/more", post(load_more))
        .route("/feed/mode", post(set_drain_mode))
}

/// 获取当前浏览状态
pub async fn get_feed(
    Extension(controller): Extension<Arc<DrainController>>,
) -> Result<ApiResponse<FeedSnapshot>, ApiError> {
    Ok(ApiResponse::ok(controller.snapshot()))
}

/// 从第一页开始浏览新的来源
pub async fn browse(
    Extension(controller): Extension<Arc<DrainController>>,
    ValidatedJson(request): ValidatedJson<BrowseRequest>,
) -> Result<ApiResponse<FeedResponse>, ApiError> {
    let source = SourceId::parse(&request.source)?;
    respond(&controller, controller.start_browsing(source).await)
}

/// 加载下一页，上一步失败时以相同游标重试
pub async fn load_more(
    Extension(controller): Extension<Arc<DrainController>>,
) -> Result<ApiResponse<FeedResponse>, ApiError> {
    match controller.load_more().await {
        StepOutcome::Busy => Err(InnerApiError::Conflict("已有加载正在进行".to_owned()).into()),
        StepOutcome::Idle => Err(InnerApiError::BadRequest("当前没有正在浏览的来源".to_owned()).into()),
        outcome => respond(&controller, outcome),
    }
}

/// 切换翻页策略，正在浏览的来源会从第一页重新开始
pub async fn set_drain_mode(
    Extension(controller): Extension<Arc<DrainController>>,
    ValidatedJson(request): ValidatedJson<DrainModeRequest>,
) -> Result<ApiResponse<FeedResponse>, ApiError> {
    respond(&controller, controller.set_drain_mode(request.mode).await)
}

/// 失败时按错误类型返回状态码，同时附带失败前已经累积的视频
fn respond(controller: &DrainController, outcome: StepOutcome) -> Result<ApiResponse<FeedResponse>, ApiError> {
    let feed = controller.snapshot();
    if outcome == StepOutcome::Failed
        && let Some(error) = &feed.error
    {
        let (status, message) = (feed_error_status(error), error.to_string());
        return Ok(ApiResponse::error_with_data(
            status,
            message,
            FeedResponse { outcome, feed },
        ));
    }
    Ok(ApiResponse::ok(FeedResponse { outcome, feed }))
}
