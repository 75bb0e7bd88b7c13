use std::time::Duration;

use leaky_bucket::RateLimiter;
use parking_lot::Once;
use reqwest::{Method, header};
use serde_json::Value;

use crate::config::{RateLimit, VersionedCache};
use crate::youtube::YouTubeError;

pub(super) const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API 的请求客户端，所有请求都会先经过配置中的限流器
pub struct YouTubeClient {
    client: reqwest::Client,
    limiter: VersionedCache<Option<RateLimiter>>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        });
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(20))
            .build()
            .expect("failed to build reqwest client");
        let limiter = VersionedCache::new(|config| {
            Ok(config.rate_limit.as_ref().map(|RateLimit { limit, duration }| {
                RateLimiter::builder()
                    .initial(*limit)
                    .refill(*limit)
                    .max(*limit)
                    .interval(Duration::from_millis(*duration))
                    .build()
            }))
        })
        .expect("failed to create rate limiter");
        Self { client, limiter }
    }

    /// 获取一个预构建的请求，通过该方法获取请求时会检查并等待速率限制
    pub async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        // 需要在 await 前释放 guard
        let limiter = self.limiter.load_full();
        if let Some(limiter) = limiter.as_ref() {
            limiter.acquire_one().await;
        }
        self.client.request(method, format!("{API_BASE}{path}"))
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 校验响应状态，失败时从 `{"error": {"code", "message", "errors": [{"reason"}]}}` 中提取原因
pub(super) async fn validate_response(response: reqwest::Response) -> Result<Value, YouTubeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<Value>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body))
}

pub(super) fn error_from_body(status: u16, body: &str) -> YouTubeError {
    let value = serde_json::from_str::<Value>(body).unwrap_or(Value::Null);
    let error = &value["error"];
    let reason = error["errors"][0]["reason"]
        .as_str()
        .or_else(|| error["status"].as_str())
        .unwrap_or_default()
        .to_owned();
    let message = error["message"]
        .as_str()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| body.chars().take(200).collect());
    YouTubeError::ErrorResponse {
        status,
        reason,
        message,
    }
}
