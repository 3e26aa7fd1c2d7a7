//! # Submission Error Classification
//!
//! Maps a failure reported by the external service into a category, a
//! severity and a stable error code. Retry timing is not decided here; see
//! [`RetryPolicy`](crate::orchestration::RetryPolicy).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ ServiceError    │────▶│ ErrorClassifier │────▶│ Classification  │
//! │ + Context       │     │ Strategy        │     │ Result          │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use submission_core::orchestration::error_classifier::{
//!     ErrorCategory, ErrorClassifier, ErrorContext, StandardErrorClassifier,
//! };
//! use submission_core::services::ServiceError;
//!
//! let classifier = StandardErrorClassifier::new();
//! let context = ErrorContext::new("submit", "ESP32_001_2024-01-15T00:00Z_policy_abc", 0, 3);
//! let classification = classifier.classify_error(&ServiceError::http(503, "unavailable"), &context);
//!
//! assert_eq!(classification.error_category, ErrorCategory::ServerError);
//! assert!(classification.is_retryable);
//! ```

use crate::constants::error_codes;
use crate::services::ServiceError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Context information for error classification
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Logical operation (`submit`, `status-poll`)
    pub operation: String,
    /// Display form of the submission key
    pub submission_key: String,
    /// Retries already spent on this key (0 on the first attempt)
    pub attempt_number: u32,
    pub max_retries: u32,
}

impl ErrorContext {
    pub fn new(
        operation: impl Into<String>,
        submission_key: impl Into<String>,
        attempt_number: u32,
        max_retries: u32,
    ) -> Self {
        Self {
            operation: operation.into(),
            submission_key: submission_key.into(),
            attempt_number,
            max_retries,
        }
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// Category-level verdict; retry budget is checked by the retry policy
    pub is_retryable: bool,
    pub error_code: String,
    pub error_message: String,
    pub remediation_suggestions: Vec<String>,
    /// Minimum wait requested by the service
    pub retry_after: Option<Duration>,
    /// Classification confidence (0.0 - 1.0)
    pub confidence: f64,
}

/// Failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection refused, reset or unreachable
    Network,
    Timeout,
    /// Remote side asked us to slow down
    RateLimit,
    /// Credentials rejected; retried once after a refresh
    Authentication,
    /// Access forbidden - permanent
    Authorization,
    /// Bad or unknown payload - permanent
    Validation,
    ServerError,
    /// Unrecognised failure - conservative retry
    Unknown,
}

impl ErrorCategory {
    /// Never worth retrying as-is
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Authorization | Self::Validation)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::RateLimit => write!(f, "rate_limit"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::ServerError => write!(f, "server_error"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// How loudly a failure should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Severity for a failure of `category` on retry `attempt_number`
    pub fn assess(category: ErrorCategory, attempt_number: u32) -> Self {
        match category {
            ErrorCategory::Authentication if attempt_number > 2 => Self::Critical,
            ErrorCategory::Authorization => Self::High,
            ErrorCategory::Network | ErrorCategory::Timeout if attempt_number > 3 => Self::High,
            ErrorCategory::RateLimit => Self::Medium,
            _ if attempt_number > 5 => Self::High,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "low"),
            ErrorSeverity::Medium => write!(f, "medium"),
            ErrorSeverity::High => write!(f, "high"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    /// Classify an error and provide handling recommendations
    fn classify_error(&self, error: &ServiceError, context: &ErrorContext) -> ErrorClassification;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Status-code and transport based classifier
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier;

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    fn classify_status(status: u16) -> (ErrorCategory, String) {
        match status {
            400 => (ErrorCategory::Validation, error_codes::BAD_REQUEST.to_string()),
            401 => (ErrorCategory::Authentication, error_codes::UNAUTHORIZED.to_string()),
            403 => (ErrorCategory::Authorization, error_codes::FORBIDDEN.to_string()),
            404 => (ErrorCategory::Validation, error_codes::NOT_FOUND.to_string()),
            408 => (ErrorCategory::Timeout, error_codes::TIMEOUT_ERROR.to_string()),
            422 => (ErrorCategory::Validation, error_codes::UNPROCESSABLE.to_string()),
            429 => (ErrorCategory::RateLimit, error_codes::RATE_LIMITED.to_string()),
            s if s >= 500 => (ErrorCategory::ServerError, error_codes::SERVER_ERROR.to_string()),
            s => (ErrorCategory::Unknown, error_codes::http(s)),
        }
    }

    /// Message heuristics for failures without a status code
    fn classify_message(message: &str) -> (ErrorCategory, &'static str) {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
            (ErrorCategory::Timeout, error_codes::TIMEOUT_ERROR)
        } else if lower.contains("rate limit") || lower.contains("too many requests") {
            (ErrorCategory::RateLimit, error_codes::RATE_LIMITED)
        } else if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("dns")
            || lower.contains("unreachable")
        {
            (ErrorCategory::Network, error_codes::CONNECTION_ERROR)
        } else if lower.contains("unauthorized") || lower.contains("authentication") {
            (ErrorCategory::Authentication, error_codes::UNAUTHORIZED)
        } else if lower.contains("forbidden") || lower.contains("permission") {
            (ErrorCategory::Authorization, error_codes::FORBIDDEN)
        } else if lower.contains("invalid") || lower.contains("validation") {
            (ErrorCategory::Validation, error_codes::BAD_REQUEST)
        } else {
            (ErrorCategory::Unknown, error_codes::UNKNOWN_ERROR)
        }
    }

    fn suggestions(category: ErrorCategory) -> Vec<String> {
        let items: &[&str] = match category {
            ErrorCategory::Network => &[
                "Check network connectivity to the verification service",
                "Verify DNS resolution and firewall rules",
            ],
            ErrorCategory::Timeout => &[
                "Check external service latency",
                "Review request timeout configuration",
            ],
            ErrorCategory::RateLimit => &[
                "Lower rate_limit budgets to match the service's quota",
                "Spread scheduled submissions over a longer window",
            ],
            ErrorCategory::Authentication => &[
                "Verify service credentials",
                "Check the credential refresh flow",
            ],
            ErrorCategory::Authorization => &[
                "Confirm the account may submit to this destination",
            ],
            ErrorCategory::Validation => &[
                "Inspect the report payload for missing or invalid fields",
                "Confirm the destination identifier exists",
            ],
            ErrorCategory::ServerError => &["Check the external service status page"],
            ErrorCategory::Unknown => &["Review logs for the raw error"],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(&self, error: &ServiceError, context: &ErrorContext) -> ErrorClassification {
        let (category, code, confidence) = match error {
            ServiceError::Http { status, .. } => {
                let (category, code) = Self::classify_status(*status);
                (category, code, 0.95)
            }
            ServiceError::ConnectionRefused(_) | ServiceError::ConnectionReset(_) => (
                ErrorCategory::Network,
                error_codes::CONNECTION_ERROR.to_string(),
                0.95,
            ),
            ServiceError::DeadlineExceeded(_) => (
                ErrorCategory::Timeout,
                error_codes::TIMEOUT_ERROR.to_string(),
                0.95,
            ),
            ServiceError::CredentialRefresh(_) => (
                ErrorCategory::Authentication,
                error_codes::AUTH_REFRESH_FAILED.to_string(),
                0.9,
            ),
            ServiceError::Other(message) => {
                let (category, code) = Self::classify_message(message);
                (category, code.to_string(), 0.6)
            }
        };

        ErrorClassification {
            error_category: category,
            severity: ErrorSeverity::assess(category, context.attempt_number),
            is_retryable: !category.is_permanent(),
            error_code: code,
            error_message: format!(
                "{} failed for {}: {error}",
                context.operation, context.submission_key
            ),
            remediation_suggestions: Self::suggestions(category),
            retry_after: error.retry_after(),
            confidence,
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}
