//! # Retry Policy
//!
//! Retry/no-retry decisions and backoff delays for failed submissions.
//!
//! ## Key Features
//!
//! - **Exponential Backoff**: `base * exponential_base^attempt`, capped at `max_delay`
//! - **Server-Requested Backoff**: Retry-After values floor the delay (capped)
//! - **Rate-Limit Floor**: rate-limited failures never retry before the
//!   limiter's own wait time
//! - **Jitter**: uniform factor in `[1.0, 1.2]` applied last

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::orchestration::error_classifier::ErrorCategory;

const JITTER_MIN: f64 = 1.0;
const JITTER_MAX: f64 = 1.2;

/// Extra inputs that can push a delay up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffHints {
    /// Current rate limiter wait
    pub rate_limit_wait: Option<Duration>,
    /// Retry-After from the external service
    pub retry_after: Option<Duration>,
}

/// Backoff and retry decisions driven by `RetryConfig`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// False once the budget is spent or for permanent categories
    pub fn should_retry(&self, category: ErrorCategory, attempt_count: u32) -> bool {
        should_retry(category, attempt_count, self.config.max_retries)
    }

    /// Delay before retry number `attempt_count + 1`
    pub fn delay(&self, attempt_count: u32, category: ErrorCategory) -> Duration {
        self.delay_with_hints(attempt_count, category, BackoffHints::default())
    }

    pub fn delay_with_hints(
        &self,
        attempt_count: u32,
        category: ErrorCategory,
        hints: BackoffHints,
    ) -> Duration {
        let mut delay = self.unjittered_delay(attempt_count, category);

        if let Some(retry_after) = hints.retry_after {
            delay = delay.max(retry_after.min(self.config.max_delay()));
        }
        if category == ErrorCategory::RateLimit {
            if let Some(wait) = hints.rate_limit_wait {
                delay = delay.max(wait);
            }
        }

        if self.config.jitter_enabled {
            let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Whether a failure recorded at `last_attempt_at` has waited long enough
    pub fn is_due(
        &self,
        attempt_count: u32,
        category: ErrorCategory,
        last_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let required = self.unjittered_delay(attempt_count, category);
        let elapsed = now
            .signed_duration_since(last_attempt_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed >= required
    }

    /// `min(base * exponential_base^attempt, max)` with the server-error scale
    fn unjittered_delay(&self, attempt_count: u32, category: ErrorCategory) -> Duration {
        let mut base = self.config.base_delay().as_secs_f64();
        if category == ErrorCategory::ServerError {
            base *= self.config.server_error_multiplier;
        }
        let max = self.config.max_delay().as_secs_f64();
        let exponent = i32::try_from(attempt_count).unwrap_or(i32::MAX);
        let seconds = base * self.config.exponential_base.powi(exponent);

        if seconds.is_finite() && seconds < max {
            Duration::from_secs_f64(seconds)
        } else {
            self.config.max_delay()
        }
    }
}

/// False if `attempt_count >= max_retries`, false for permanent categories,
/// true otherwise
pub fn should_retry(category: ErrorCategory, attempt_count: u32, max_retries: u32) -> bool {
    attempt_count < max_retries && !category.is_permanent()
}

/// Parse a Retry-After header: delta-seconds or an HTTP date in the future
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    date.with_timezone(&Utc)
        .signed_duration_since(Utc::now())
        .to_std()
        .ok()
        .filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig::default())
    }

    fn within(actual: Duration, low_secs: f64, high_secs: f64) -> bool {
        let secs = actual.as_secs_f64();
        secs >= low_secs - 1e-9 && secs <= high_secs + 1e-9
    }

    #[test]
    fn test_backoff_growth_with_jitter_bounds() {
        let policy = policy();
        for _ in 0..50 {
            assert!(within(policy.delay(0, ErrorCategory::Network), 1.0, 1.2));
            assert!(within(policy.delay(1, ErrorCategory::Network), 2.0, 2.4));
            assert!(within(policy.delay(2, ErrorCategory::Network), 4.0, 4.8));
            assert!(policy.delay(10, ErrorCategory::Network) <= Duration::from_secs(72));
        }
    }

    #[test]
    fn test_server_errors_use_doubled_base() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_enabled: false,
            ..RetryConfig::default()
        });
        assert_eq!(policy.delay(0, ErrorCategory::ServerError), Duration::from_secs(2));
        assert_eq!(policy.delay(1, ErrorCategory::ServerError), Duration::from_secs(4));
        assert_eq!(policy.delay(40, ErrorCategory::ServerError), Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_floor_and_retry_after() {
        let policy = RetryPolicy::new(RetryConfig {
            jitter_enabled: false,
            ..RetryConfig::default()
        });
        let hints = BackoffHints {
            rate_limit_wait: Some(Duration::from_secs(9)),
            retry_after: None,
        };
        assert_eq!(
            policy.delay_with_hints(0, ErrorCategory::RateLimit, hints),
            Duration::from_secs(9)
        );
        // The limiter floor only applies to rate-limit failures
        assert_eq!(
            policy.delay_with_hints(0, ErrorCategory::Network, hints),
            Duration::from_secs(1)
        );

        let hints = BackoffHints {
            rate_limit_wait: None,
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(
            policy.delay_with_hints(0, ErrorCategory::ServerError, hints),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_should_retry_rules() {
        assert!(should_retry(ErrorCategory::ServerError, 0, 3));
        assert!(should_retry(ErrorCategory::Unknown, 2, 3));
        assert!(!should_retry(ErrorCategory::ServerError, 3, 3));
        assert!(!should_retry(ErrorCategory::Validation, 0, 3));
        assert!(!should_retry(ErrorCategory::Authorization, 0, 3));
    }

    #[test]
    fn test_is_due_respects_backoff() {
        let policy = policy();
        let now = Utc::now();
        assert!(!policy.is_due(
            2,
            ErrorCategory::Network,
            now - chrono::Duration::seconds(2),
            now
        ));
        assert!(policy.is_due(
            2,
            ErrorCategory::Network,
            now - chrono::Duration::seconds(5),
            now
        ));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("later"), None);

        let future = (Utc::now() + chrono::Duration::seconds(90)).to_rfc2822();
        let parsed = parse_retry_after(&future).unwrap();
        assert!(parsed <= Duration::from_secs(90) && parsed >= Duration::from_secs(85));

        let past = (Utc::now() - chrono::Duration::seconds(90)).to_rfc2822();
        assert_eq!(parse_retry_after(&past), None);
    }
}
