//! # Submission Configuration System
//!
//! Typed configuration for the delivery core. Every value has a documented
//! default so a bare `SubmissionConfig::default()` is a working setup; files and
//! environment variables only override what they name.
//!
//! ## Layering
//!
//! 1. Built-in defaults (`SubmissionConfig::default()`)
//! 2. `config/submission.toml`
//! 3. `config/submission.{environment}.toml`
//! 4. Environment variables prefixed `SUBMISSION__`, nested with `__`
//!    (e.g. `SUBMISSION__RETRY__MAX_RETRIES=5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use submission_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_retries = manager.config().retry.max_retries;
//! let poll_interval = manager.config().scheduler.poll_interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::windows;
use crate::resilience::CircuitBreakerSettings;

const DAILY_TIME_FORMAT: &str = "%H:%M";
/// Retry sweep window cap, one year
const MAX_RETRY_MAX_AGE_HOURS: u64 = 8760;

/// Root configuration structure mirroring `config/submission.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Background loop and queue settings
    pub scheduler: SchedulerConfig,

    /// Retry and backoff settings
    pub retry: RetryConfig,

    /// Request budgets for the external service
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,
}

impl SubmissionConfig {
    /// Validate every section, failing on the first invalid value
    pub fn validate(&self) -> ConfigResult<()> {
        self.scheduler.validate()?;
        self.retry.validate()?;
        self.rate_limit.validate()?;
        self.circuit_breaker.validate()?;
        Ok(())
    }
}

/// Scheduler loop configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Master switch; when false every enqueue is refused
    pub submission_enabled: bool,
    /// Daily trigger instant, UTC, `HH:MM`
    pub daily_time: String,
    pub poll_interval_ms: u64,
    pub max_concurrent_submissions: usize,
    /// Failed submissions older than this are not swept for retry
    pub retry_max_age_hours: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_destination: Option<String>,
    /// Empty means every subject is enabled
    pub enabled_subjects: Vec<String>,
    pub excluded_subjects: Vec<String>,
    /// Number of queued items included in a queue snapshot
    pub snapshot_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submission_enabled: true,
            daily_time: "01:00".to_string(),
            poll_interval_ms: 10_000,
            max_concurrent_submissions: 5,
            retry_max_age_hours: 24,
            default_destination: None,
            enabled_subjects: Vec::new(),
            excluded_subjects: Vec::new(),
            snapshot_limit: 10,
        }
    }
}

impl SchedulerConfig {
    /// Get queue poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get retry sweep age limit as Duration
    pub fn retry_max_age(&self) -> Duration {
        Duration::from_secs(self.retry_max_age_hours.saturating_mul(3600))
    }

    /// Parsed daily trigger time; validated configs always parse
    pub fn daily_submission_time(&self) -> NaiveTime {
        NaiveTime::parse_from_str(&self.daily_time, DAILY_TIME_FORMAT)
            .unwrap_or(NaiveTime::MIN + chrono::Duration::hours(1))
    }

    /// Exclusion wins over inclusion
    pub fn is_subject_enabled(&self, subject_id: &str) -> bool {
        if self.excluded_subjects.iter().any(|s| s == subject_id) {
            return false;
        }
        self.enabled_subjects.is_empty() || self.enabled_subjects.iter().any(|s| s == subject_id)
    }

    fn validate(&self) -> ConfigResult<()> {
        if NaiveTime::parse_from_str(&self.daily_time, DAILY_TIME_FORMAT).is_err() {
            return Err(ConfigurationError::invalid_value(
                "scheduler.daily_time",
                &self.daily_time,
                "expected HH:MM",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.poll_interval_ms",
                self.poll_interval_ms,
                "must be greater than 0",
            ));
        }
        if self.max_concurrent_submissions == 0 {
            return Err(ConfigurationError::invalid_value(
                "scheduler.max_concurrent_submissions",
                self.max_concurrent_submissions,
                "must be greater than 0",
            ));
        }
        if self.retry_max_age_hours > MAX_RETRY_MAX_AGE_HOURS {
            return Err(ConfigurationError::invalid_value(
                "scheduler.retry_max_age_hours",
                self.retry_max_age_hours,
                "must be at most 8760 (one year)",
            ));
        }
        if let Some(destination) = &self.default_destination {
            if destination.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "scheduler.default_destination",
                    destination,
                    "must not be blank when set",
                ));
            }
        }
        Ok(())
    }
}

/// Backoff and retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter_enabled: bool,
    /// Base delay scale applied to server errors
    pub server_error_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter_enabled: true,
            server_error_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.base_delay_ms",
                self.base_delay_ms,
                "must be greater than 0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.max_delay_ms,
                "must not be smaller than retry.base_delay_ms",
            ));
        }
        if !self.exponential_base.is_finite() || self.exponential_base < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.exponential_base",
                self.exponential_base,
                "must be a finite value >= 1.0",
            ));
        }
        if !self.server_error_multiplier.is_finite() || self.server_error_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.server_error_multiplier",
                self.server_error_multiplier,
                "must be a finite value >= 1.0",
            ));
        }
        Ok(())
    }
}

/// Request budgets for one external destination
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub burst: usize,
    pub burst_window_seconds: u64,
    pub per_minute: usize,
    pub per_hour: usize,
    pub cooldown_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            burst_window_seconds: windows::BURST_SECONDS,
            per_minute: 60,
            per_hour: 1000,
            cooldown_seconds: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn burst_window(&self) -> Duration {
        Duration::from_secs(self.burst_window_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("rate_limit.burst", self.burst),
            ("rate_limit.per_minute", self.per_minute),
            ("rate_limit.per_hour", self.per_hour),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "must be greater than 0",
                ));
            }
        }
        if self.burst_window_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "rate_limit.burst_window_seconds",
                self.burst_window_seconds,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Circuit breaker configuration with optional per-operation overrides
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// When false every call is allowed through
    pub enabled: bool,
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
    /// Overrides keyed by operation name (`submit`, `status-poll`)
    pub operations: HashMap<String, CircuitBreakerOperationConfig>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_seconds: 60,
            operations: HashMap::new(),
        }
    }
}

/// Override for a single operation
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CircuitBreakerOperationConfig {
    pub failure_threshold: u32,
    pub cooldown_seconds: u64,
}

impl CircuitBreakerConfig {
    /// Settings for an operation, falling back to the global threshold
    pub fn settings_for_operation(&self, operation: &str) -> CircuitBreakerSettings {
        match self.operations.get(operation) {
            Some(op) => CircuitBreakerSettings {
                failure_threshold: op.failure_threshold,
                cooldown: Duration::from_secs(op.cooldown_seconds),
            },
            None => CircuitBreakerSettings {
                failure_threshold: self.failure_threshold,
                cooldown: Duration::from_secs(self.cooldown_seconds),
            },
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        self.settings_for_operation("")
            .validate()
            .map_err(|reason| {
                ConfigurationError::invalid_value("circuit_breaker", self.failure_threshold, reason)
            })?;
        for name in self.operations.keys() {
            self.settings_for_operation(name)
                .validate()
                .map_err(|reason| {
                    ConfigurationError::invalid_value(
                        format!("circuit_breaker.operations.{name}"),
                        name,
                        reason,
                    )
                })?;
        }
        Ok(())
    }
}
