use serde::Serialize;
use thiserror::Error;

/// 取流、去重过程中暴露给调用方的错误分类
///
/// 需要保存在 [`crate::feed::FeedSnapshot`] 中随状态一起发布，因此只携带字符串信息并实现 `Clone`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FeedError {
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("rate limited by video source: {0}")]
    RateLimited(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("quota or authorization failure: {0}")]
    QuotaOrAuthFailure(String),
    #[error("watch history check failed, {unresolved} videos left unresolved: {message}")]
    PartialDedupFailure { unresolved: usize, message: String },
}

impl FeedError {
    /// 可以由调用方使用相同的游标手动重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::RateLimited(_) | FeedError::NetworkFailure(_) | FeedError::PartialDedupFailure { .. }
        )
    }

    /// 对整个会话都致命，重试没有意义
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::QuotaOrAuthFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(FeedError::RateLimited("slow down".into()).is_transient());
        assert!(FeedError::NetworkFailure("reset".into()).is_transient());
        assert!(!FeedError::InvalidSource("x".into()).is_transient());
        assert!(!FeedError::InvalidSource("x".into()).is_fatal());
        assert!(FeedError::QuotaOrAuthFailure("quotaExceeded".into()).is_fatal());
        assert!(!FeedError::QuotaOrAuthFailure("quotaExceeded".into()).is_transient());
    }

    #[test]
    fn test_error_serialize() {
        let value = serde_json::to_value(FeedError::RateLimited("slow down".into())).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "rate_limited", "detail": "slow down"}));
        let value = serde_json::to_value(FeedError::PartialDedupFailure {
            unresolved: 3,
            message: "database is locked".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"kind": "partial_dedup_failure", "detail": {"unresolved": 3, "message": "database is locked"}})
        );
    }
}
