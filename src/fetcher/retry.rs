//! Retry budget and wait strategy for calls against third-party servers.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::{Result, WatcherError};

/// Why an attempt should be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    Timeout,
    ServerError(u16),
    TooManyRequests { retry_after: Option<String> },
}

/// Result of a single attempt inside [`RetryPolicy::run`].
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry { reason: RetryReason, error: WatcherError },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// First exponential backoff delay
    pub base_delay: Duration,
    /// Upper bound for exponential backoff
    pub max_delay: Duration,
    /// Wait used for 429 responses without a usable Retry-After
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            default_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay after the given 1-based attempt: base, 2*base, 4*base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn wait_for(&self, attempt: u32, reason: &RetryReason) -> Duration {
        match reason {
            RetryReason::TooManyRequests { retry_after } => retry_after
                .as_deref()
                .and_then(|value| parse_retry_after(value, Utc::now()))
                .unwrap_or(self.default_retry_after),
            RetryReason::Timeout | RetryReason::ServerError(_) => self.backoff(attempt),
        }
    }

    /// Run `op` until it finishes, fails with a non-retryable error, or the
    /// attempt budget is spent. The last retryable error is returned in that case.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        let mut attempt = 1;
        loop {
            match op().await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry { reason, error } => {
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    let delay = self.wait_for(attempt, &reason);
                    tracing::debug!(
                        "Attempt {} failed ({:?}), retrying in {:?}",
                        attempt,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Parse a `Retry-After` value: delta seconds, or an HTTP date relative to `now`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let target = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((target - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("1", Utc::now()), Some(Duration::from_secs(1)));
        assert_eq!(parse_retry_after(" 120 ", Utc::now()), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = DateTime::parse_from_rfc3339("2015-10-21T07:27:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        let now = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_retry_after_garbage() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
    }

    #[test]
    fn test_wait_for_429_defaults_to_sixty_seconds() {
        let policy = RetryPolicy::default();
        let missing = RetryReason::TooManyRequests { retry_after: None };
        let garbage = RetryReason::TooManyRequests {
            retry_after: Some("later".into()),
        };
        assert_eq!(policy.wait_for(1, &missing), Duration::from_secs(60));
        assert_eq!(policy.wait_for(1, &garbage), Duration::from_secs(60));
    }

    #[test]
    fn test_wait_for_server_error_uses_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_for(2, &RetryReason::ServerError(503)), Duration::from_secs(2));
        assert_eq!(policy.wait_for(1, &RetryReason::Timeout), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Attempt::Retry {
                    reason: RetryReason::ServerError(500),
                    error: WatcherError::HttpStatus {
                        url: "https://example.com".into(),
                        status: 500,
                    },
                })
            })
            .await;

        assert!(matches!(result, Err(WatcherError::HttpStatus { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_hard_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = fast_policy()
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WatcherError::Other("boom".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_returns_first_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let value = fast_policy()
            .run(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(Attempt::Retry {
                        reason: RetryReason::Timeout,
                        error: WatcherError::Other("timeout".into()),
                    })
                } else {
                    Ok(Attempt::Done(n))
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
