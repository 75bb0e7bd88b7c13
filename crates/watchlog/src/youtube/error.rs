use thiserror::Error;

use crate::error::FeedError;

#[derive(Error, Debug)]
pub enum YouTubeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned status {status} ({reason}): {message}")]
    ErrorResponse { status: u16, reason: String, message: String },
    #[error("unexpected response body: {0}")]
    InvalidResponse(String),
    #[error("api key is not configured")]
    MissingApiKey,
}

impl YouTubeError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            YouTubeError::ErrorResponse { status, reason, .. } => {
                *status == 429 || matches!(reason.as_str(), "rateLimitExceeded" | "userRateLimitExceeded")
            }
            _ => false,
        }
    }

    pub fn is_quota_or_auth(&self) -> bool {
        match self {
            YouTubeError::ErrorResponse { status, reason, .. } => {
                let fatal_reason = matches!(
                    reason.as_str(),
                    "quotaExceeded" | "dailyLimitExceeded" | "keyInvalid" | "keyExpired" | "accessNotConfigured"
                );
                fatal_reason || ((*status == 401 || *status == 403) && !self.is_rate_limited())
            }
            YouTubeError::MissingApiKey => true,
            _ => false,
        }
    }
}

impl From<YouTubeError> for FeedError {
    fn from(err: YouTubeError) -> Self {
        if err.is_rate_limited() {
            return FeedError::RateLimited(err.to_string());
        }
        if err.is_quota_or_auth() {
            return FeedError::QuotaOrAuthFailure(err.to_string());
        }
        match err {
            YouTubeError::ErrorResponse { status: 404, .. } => FeedError::InvalidSource(err.to_string()),
            _ => FeedError::NetworkFailure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, reason: &str) -> YouTubeError {
        YouTubeError::ErrorResponse {
            status,
            reason: reason.to_owned(),
            message: String::new(),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let testcases = [
            (response(429, ""), "rate_limited"),
            (response(403, "rateLimitExceeded"), "rate_limited"),
            (response(403, "userRateLimitExceeded"), "rate_limited"),
            (response(403, "quotaExceeded"), "quota"),
            (response(403, "dailyLimitExceeded"), "quota"),
            (response(403, "forbidden"), "quota"),
            (response(401, "authError"), "quota"),
            (response(400, "keyInvalid"), "quota"),
            (response(400, "invalidPageToken"), "network"),
            (response(404, "playlistNotFound"), "invalid"),
            (response(503, "backendError"), "network"),
            (YouTubeError::InvalidResponse("eof".to_owned()), "network"),
            (YouTubeError::MissingApiKey, "quota"),
        ];
        for (err, expected) in testcases {
            let display = err.to_string();
            let kind = match FeedError::from(err) {
                FeedError::RateLimited(_) => "rate_limited",
                FeedError::QuotaOrAuthFailure(_) => "quota",
                FeedError::NetworkFailure(_) => "network",
                FeedError::InvalidSource(_) => "invalid",
                FeedError::PartialDedupFailure { .. } => "dedup",
            };
            assert_eq!(kind, expected, "{display}");
        }
    }
}
