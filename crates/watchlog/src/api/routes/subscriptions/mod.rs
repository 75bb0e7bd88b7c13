use std::sync::Arc;

use axum::Router;
use axum::extract::Extension;
use axum::routing::get;

use crate::api::wrapper::{ApiError, ApiResponse};
use crate::subscriptions::{SubscriptionDigest, SubscriptionDigests};

pub(super) fn router() -> Router {
    Router::new().route("/subscriptions", get(get_subscriptions))
}

/// 列出订阅来源最近一次刷新的结果
pub async fn get_subscriptions(
    Extension(digests): Extension<Arc<SubscriptionDigests>>,
) -> Result<ApiResponse<Vec<SubscriptionDigest>>, ApiError> {
    Ok(ApiResponse::ok(digests.list()))
}
