use std::time::Duration;

use slackline_core::{classify, AppError};

#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    #[error("rate limited{}", .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("slack error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),
}

pub type ApiResult<T> = std::result::Result<T, SlackApiError>;

impl SlackApiError {
    /// Symbolic name fed to [`classify`].
    pub fn symbol(&self) -> &str {
        match self {
            Self::RateLimited { .. } => "ratelimited",
            Self::Api(name) => name.as_str(),
            Self::Http(_) => "http_error",
            Self::Status { .. } => "http_status",
            Self::Decode(_) => "decode_error",
        }
    }

    /// HTTP 429, or an `ok: false` body naming a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api(name) => is_rate_limit_symbol(name),
            _ => false,
        }
    }

    /// Server-requested wait, if any. Zero counts as absent.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => retry_after.filter(|d| !d.is_zero()),
            _ => None,
        }
    }
}

pub(crate) fn is_rate_limit_symbol(name: &str) -> bool {
    matches!(name, "ratelimited" | "rate_limited")
}

impl From<SlackApiError> for AppError {
    fn from(err: SlackApiError) -> Self {
        let code = classify(err.symbol());
        AppError::new(code, code.summary()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slackline_core::ErrorCode;

    #[test]
    fn api_errors_classify_by_symbol() {
        let err: AppError = SlackApiError::Api("not_in_channel".into()).into();
        assert_eq!(err.code, ErrorCode::NotInChannel);
        assert_eq!(err.to_string(), "not_in_channel: bot is not a member of the channel (slack error: not_in_channel)");
    }

    #[test]
    fn unknown_failures_are_network_errors() {
        let err: AppError = SlackApiError::Decode("eof".into()).into();
        assert_eq!(err.code, ErrorCode::NetworkError);

        let err: AppError = SlackApiError::Status { status: 502, body: String::new() }.into();
        assert_eq!(err.code, ErrorCode::NetworkError);
    }

    #[test]
    fn rate_limit_symbols_in_body_count_as_rate_limited() {
        assert!(SlackApiError::Api("ratelimited".into()).is_rate_limited());
        assert!(SlackApiError::Api("rate_limited".into()).is_rate_limited());
        assert!(!SlackApiError::Api("not_in_channel".into()).is_rate_limited());
    }

    #[test]
    fn zero_retry_after_is_absent() {
        let err = SlackApiError::RateLimited { retry_after: Some(Duration::ZERO) };
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), None);

        let err = SlackApiError::RateLimited { retry_after: Some(Duration::from_secs(3)) };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(err.to_string(), "rate limited, retry after 3s");
    }
}
