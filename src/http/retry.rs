//! Retry scheduling
//!
//! Decides whether a failed attempt is retried and how long to wait first.
//! Only transient failures qualify: no response, timeouts, `5xx`, `408` and
//! `429`. A `401` belongs to the refresh coordinator and never reaches here.

use crate::cancel::AbortSignal;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Retry policy for one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts allowed beyond the original
    pub max_retries: u32,
    /// Unit delay for backoff
    pub base_delay: Duration,
    /// Growth of the delay across attempts
    pub backoff_type: BackoffType,
    /// Upper bound for computed delays (`Retry-After` is not capped)
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_type: BackoffType::Linear,
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff_type {
            BackoffType::Constant => self.base_delay,
            BackoffType::Linear => self.base_delay.saturating_mul(attempt),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Delay before the next attempt, or `None` when `error` is terminal or
    /// `retries_done` already reached the cap
    pub fn next_delay(&self, error: &Error, retries_done: u32) -> Option<Duration> {
        if !error.is_retryable() || retries_done >= self.max_retries {
            return None;
        }
        Some(
            error
                .retry_after()
                .unwrap_or_else(|| self.backoff(retries_done + 1)),
        )
    }

    /// Sleep for `delay` unless `signal` fires first
    pub async fn wait(&self, delay: Duration, signal: &AbortSignal) -> Result<()> {
        signal
            .guard(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await
    }
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod retry_tests {
    use super::*;
    use test_case::test_case;

    fn policy(backoff_type: BackoffType) -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            backoff_type,
            max_backoff: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.backoff_type, BackoffType::Linear);
    }

    #[test]
    fn test_backoff_constant() {
        let policy = policy(BackoffType::Constant);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(5), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_linear() {
        let policy = policy(BackoffType::Linear);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_exponential() {
        let policy = policy(BackoffType::Exponential);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_respects_max() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_millis(500),
            ..policy(BackoffType::Exponential)
        };
        assert_eq!(policy.backoff(10), Duration::from_millis(500));
    }

    #[test_case(Error::from_status(500, "", None), true ; "server error")]
    #[test_case(Error::from_status(408, "", None), true ; "request timeout status")]
    #[test_case(Error::from_status(429, "", None), true ; "rate limited")]
    #[test_case(Error::network("reset"), true ; "no response")]
    #[test_case(Error::timeout(Duration::from_secs(1)), true ; "timed out")]
    #[test_case(Error::from_status(404, "", None), false ; "not found")]
    #[test_case(Error::from_status(422, "", None), false ; "validation")]
    #[test_case(Error::auth_expired("gone"), false ; "auth expired")]
    #[test_case(Error::aborted("closed"), false ; "aborted")]
    fn test_next_delay_eligibility(error: Error, eligible: bool) {
        let policy = policy(BackoffType::Linear);
        assert_eq!(policy.next_delay(&error, 0).is_some(), eligible);
    }

    #[test]
    fn test_next_delay_respects_cap() {
        let policy = policy(BackoffType::Linear);
        let error = Error::from_status(503, "", None);
        assert_eq!(policy.next_delay(&error, 0), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(&error, 2), Some(Duration::from_millis(300)));
        assert_eq!(policy.next_delay(&error, 3), None);
    }

    #[test]
    fn test_next_delay_prefers_retry_after() {
        let policy = policy(BackoffType::Linear);
        let error = Error::from_status(429, "", Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(&error, 0), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );

        let future = (Utc::now() + chrono::Duration::seconds(120)).to_rfc2822();
        let delay = parse_retry_after(&future).unwrap();
        assert!(delay > Duration::from_secs(100));
        assert!(delay <= Duration::from_secs(120));
    }
}
