use std::borrow::Cow;

use anyhow::Error;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::response::IntoResponse;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::api::error::InnerApiError;
use crate::error::FeedError;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Cow<'static, str>>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status_code: 200,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(status_code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: None,
            message: Some(message.into()),
        }
    }

    /// 出错时仍附带当前的数据，例如失败之前已经累积的内容
    pub fn error_with_data(status_code: StatusCode, message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::error(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal_server_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(self),
        )
            .into_response()
    }
}

pub struct ApiError(Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

pub(crate) fn feed_error_status(err: &FeedError) -> StatusCode {
    match err {
        FeedError::InvalidSource(_) => StatusCode::BAD_REQUEST,
        FeedError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        FeedError::QuotaOrAuthFailure(_) => StatusCode::BAD_GATEWAY,
        FeedError::NetworkFailure(_) | FeedError::PartialDedupFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let Some(inner_error) = self.0.downcast_ref::<InnerApiError>() {
            let status = match inner_error {
                InnerApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
                InnerApiError::Conflict(_) => StatusCode::CONFLICT,
            };
            return ApiResponse::<()>::error(status, self.0.to_string()).into_response();
        }
        if let Some(feed_error) = self.0.downcast_ref::<FeedError>() {
            return ApiResponse::<()>::error(feed_error_status(feed_error), self.0.to_string()).into_response();
        }
        ApiResponse::<()>::internal_server_error(format!("{:#}", self.0)).into_response()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::from(InnerApiError::BadRequest(e.body_text())))?;
        value
            .validate()
            .map_err(|e| ApiError::from(InnerApiError::BadRequest(e.to_string())))?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_status() {
        let testcases = [
            (FeedError::InvalidSource("@handle".into()), 400),
            (FeedError::RateLimited("slow down".into()), 429),
            (FeedError::QuotaOrAuthFailure("quotaExceeded".into()), 502),
            (FeedError::NetworkFailure("reset".into()), 500),
        ];
        for (err, expected) in testcases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status().as_u16(), expected);
        }
        let response = ApiError::from(InnerApiError::Conflict("busy".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
