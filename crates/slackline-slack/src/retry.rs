use std::future::Future;
use std::time::Duration;

use slackline_core::{AppError, ErrorCode};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ApiResult, SlackApiError};

/// Bounded retry for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// First fallback wait when the server gives no `Retry-After`; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32, err: &SlackApiError) -> Duration {
        err.retry_after()
            .unwrap_or_else(|| self.base_delay.saturating_mul(2u32.saturating_pow(attempt)))
    }
}

/// Run `op`, retrying while it reports a rate limit.
///
/// Non-rate-limit failures are classified and returned on first occurrence.
/// Cancellation during a call or a wait returns `cancelled` immediately.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled()),
            r = op() => r,
        };

        let err = match result {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt, "request succeeded after rate-limit retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_rate_limited() => e,
            Err(e) => return Err(e.into()),
        };

        if attempt >= policy.max_retries {
            warn!(attempts = attempt + 1, "rate limit retries exhausted");
            return Err(AppError::new(ErrorCode::RateLimited, "rate limit reached").with_source(err));
        }

        let wait = policy.delay_for(attempt, &err);
        warn!(attempt, wait_ms = wait.as_millis() as u64, "rate limited, backing off");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled()),
            _ = tokio::time::sleep(wait) => {}
        }
        attempt += 1;
    }
}
