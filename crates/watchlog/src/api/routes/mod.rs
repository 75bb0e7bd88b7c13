use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Router, middleware};

use crate::api::wrapper::ApiResponse;
use crate::config::VersionedConfig;

mod config;
mod feed;
mod history;
mod sse;
mod subscriptions;

pub fn router() -> Router {
    Router::new().nest(
        "/api",
        config::router()
            .merge(feed::router())
            .merge(history::router())
            .merge(sse::router())
            .merge(subscriptions::router())
            .layer(middleware::from_fn(auth)),
    )
}

/// 中间件：验证请求头中的 Authorization 是否与配置中的 auth_token 匹配
pub async fn auth(headers: HeaderMap, request: Request, next: Next) -> Response {
    let authorized = {
        let config = VersionedConfig::get().load();
        headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|s| s == config.auth_token)
    };
    if authorized {
        return next.run(request).await;
    }
    ApiResponse::<()>::unauthorized("auth token does not match").into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Extension;
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::error::FeedError;
    use crate::feed::{DrainController, DrainMode};
    use crate::history::testing::FakeStore;
    use crate::history::{LocalWatchCache, WatchHistory};
    use crate::subscriptions::SubscriptionDigests;
    use crate::youtube::{Page, PageCursor, PageFetcher, SourceId, VideoRecord};

    /// 每个来源只有一页，包含三个视频；`PLflaky` 开头的来源有第二页，但第二页总是被限流
    struct SinglePageFetcher;

    #[async_trait::async_trait]
    impl PageFetcher for SinglePageFetcher {
        async fn fetch_page(&self, source: &SourceId, cursor: Option<&PageCursor>) -> Result<Page, FeedError> {
            if source.id().starts_with("PLmissing") {
                return Err(FeedError::InvalidSource("playlistNotFound".to_owned()));
            }
            let flaky = source.id().starts_with("PLflaky");
            if flaky && cursor.is_some() {
                return Err(FeedError::RateLimited("rateLimitExceeded".to_owned()));
            }
            Ok(Page {
                videos: ["a", "b", "c"].map(VideoRecord::bare).to_vec(),
                next_cursor: flaky.then(|| PageCursor {
                    token: "next".to_owned(),
                    source: source.clone(),
                }),
            })
        }
    }

    fn app() -> Router {
        let history = WatchHistory::new(Arc::new(LocalWatchCache::in_memory()), Arc::new(FakeStore::default()));
        let controller = Arc::new(DrainController::new(
            Arc::new(SinglePageFetcher),
            history,
            DrainMode::Partial,
        ));
        router()
            .layer(Extension(controller))
            .layer(Extension(Arc::new(SubscriptionDigests::default())))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authorized: bool,
    ) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if authorized {
            builder = builder.header("Authorization", VersionedConfig::get().load().auth_token.as_str());
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_auth_required() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/feed", None, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status_code"], 401);
        let (status, body) = call(&app, Method::GET, "/api/feed", None, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phase"], "idle");
    }

    #[tokio::test]
    async fn test_browse_and_mark_watched() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feed/browse",
            Some(json!({"source": "https://www.youtube.com/playlist?list=PLBCF2DAC6FFB574DE"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "exhausted");
        assert_eq!(body["data"]["feed"]["videos"].as_array().unwrap().len(), 3);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/history/watched",
            Some(json!({"ids": ["b"]})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["marked"], 1);
        let ids = body["data"]["feed"]["videos"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["a", "c"]);

        let (status, body) = call(&app, Method::POST, "/api/feed/more", None, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "exhausted");
    }

    #[tokio::test]
    async fn test_browse_errors() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feed/browse",
            Some(json!({"source": "@handle"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("invalid source"));
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/feed/browse",
            Some(json!({"source": "PLmissingmissingmissing"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/api/feed/browse", Some(json!({"source": ""})), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::POST, "/api/history/watched", Some(json!({"ids": []})), true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_load_more_without_source() {
        let app = app();
        let (status, _) = call(&app, Method::POST, "/api/feed/more", None, true).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(&app, Method::POST, "/api/feed/mode", Some(json!({"mode": "eager"})), true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "idle");
        assert_eq!(body["data"]["feed"]["mode"], "eager");
    }

    #[tokio::test]
    async fn test_failed_load_more_keeps_feed() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/feed/browse",
            Some(json!({"source": "PLflakyflakyflakyflaky"})),
            true,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["outcome"], "ready");

        let (status, body) = call(&app, Method::POST, "/api/feed/more", None, true).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["status_code"], 429);
        assert!(body["message"].as_str().unwrap().contains("rateLimitExceeded"));
        assert_eq!(body["data"]["outcome"], "failed");
        assert_eq!(body["data"]["feed"]["phase"], "error");
        assert_eq!(body["data"]["feed"]["videos"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"]["feed"]["has_more"], true);
    }
}
