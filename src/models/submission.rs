//! Submission work items and attempt outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::report::ReportCandidate;
use crate::constants::{error_codes, priorities};
use crate::orchestration::error_classifier::{ErrorCategory, ErrorSeverity};
use crate::state_machine::SubmissionStatus;

/// Idempotency unit: one subject, one reporting period, one destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionKey {
    pub subject_id: String,
    pub period_start: DateTime<Utc>,
    pub destination_id: String,
}

impl SubmissionKey {
    pub fn new(
        subject_id: impl Into<String>,
        period_start: DateTime<Utc>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            period_start,
            destination_id: destination_id.into(),
        }
    }
}

impl fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.subject_id,
            self.period_start.format("%Y-%m-%dT%H:%MZ"),
            self.destination_id
        )
    }
}

/// What caused a submission to be enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionTrigger {
    Schedule,
    Threshold,
    Manual,
    Retry,
}

impl SubmissionTrigger {
    /// Queue priority used when the caller does not pick one
    pub fn default_priority(&self) -> i32 {
        match self {
            Self::Schedule => priorities::SCHEDULE,
            Self::Threshold => priorities::THRESHOLD,
            Self::Manual => priorities::MANUAL,
            Self::Retry => priorities::RETRY,
        }
    }
}

impl fmt::Display for SubmissionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule => write!(f, "schedule"),
            Self::Threshold => write!(f, "threshold"),
            Self::Manual => write!(f, "manual"),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// A unit of work waiting in (or dispatched from) the submission queue
#[derive(Debug, Clone)]
pub struct QueuedSubmission {
    pub key: SubmissionKey,
    /// Built through the aggregator at attempt time when absent
    pub payload: Option<Arc<ReportCandidate>>,
    pub trigger: SubmissionTrigger,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_category: Option<ErrorCategory>,
    /// Set once the single post-refresh authentication retry has been granted
    pub auth_retry_used: bool,
}

impl QueuedSubmission {
    pub fn new(key: SubmissionKey, trigger: SubmissionTrigger, priority: i32) -> Self {
        Self {
            key,
            payload: None,
            trigger,
            priority,
            enqueued_at: Utc::now(),
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
            last_category: None,
            auth_retry_used: false,
        }
    }

    pub fn with_payload(mut self, payload: ReportCandidate) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Turn a failed attempt into the next retry of the same key
    pub fn into_retry(mut self, result: &SubmissionResult) -> Self {
        self.retry_count += 1;
        self.trigger = SubmissionTrigger::Retry;
        self.priority = priorities::RETRY;
        self.last_attempt_at = Some(result.submitted_at);
        self.last_error = Some(result.message.clone());
        self.last_category = result.category;
        if result.category == Some(ErrorCategory::Authentication) {
            self.auth_retry_used = true;
        }
        self
    }
}

/// Outcome of one submission attempt, or the recorded state of a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub key: SubmissionKey,
    pub success: bool,
    pub external_id: Option<String>,
    pub status: SubmissionStatus,
    pub message: String,
    pub error_code: Option<String>,
    pub category: Option<ErrorCategory>,
    pub severity: Option<ErrorSeverity>,
    /// Classification verdict for this attempt; the scheduler decides whether
    /// a retry actually happens
    pub retryable: bool,
    /// Minimum wait requested by the external service
    pub retry_after: Option<Duration>,
    pub retry_count: u32,
    pub trigger: SubmissionTrigger,
    pub submitted_at: DateTime<Utc>,
    pub response_snapshot: Option<serde_json::Value>,
}

impl SubmissionResult {
    pub fn succeeded(
        item: &QueuedSubmission,
        external_id: String,
        response_snapshot: Option<serde_json::Value>,
    ) -> Self {
        Self {
            key: item.key.clone(),
            success: true,
            external_id: Some(external_id),
            status: SubmissionStatus::Submitted,
            message: "Submission accepted".to_string(),
            error_code: None,
            category: None,
            severity: None,
            retryable: false,
            retry_after: None,
            retry_count: item.retry_count,
            trigger: item.trigger,
            submitted_at: Utc::now(),
            response_snapshot,
        }
    }

    pub fn failed(
        item: &QueuedSubmission,
        error_code: impl Into<String>,
        message: impl Into<String>,
        category: ErrorCategory,
        retryable: bool,
    ) -> Self {
        Self {
            key: item.key.clone(),
            success: false,
            external_id: None,
            status: SubmissionStatus::Failed,
            message: message.into(),
            error_code: Some(error_code.into()),
            category: Some(category),
            severity: None,
            retryable,
            retry_after: None,
            retry_count: item.retry_count,
            trigger: item.trigger,
            submitted_at: Utc::now(),
            response_snapshot: None,
        }
    }

    /// Refused by an open breaker. Carries no category so it never counts as
    /// a real failure.
    pub fn short_circuited(item: &QueuedSubmission, retry_in: Duration) -> Self {
        Self {
            key: item.key.clone(),
            success: false,
            external_id: None,
            status: SubmissionStatus::Failed,
            message: format!("Circuit open, retry in {}ms", retry_in.as_millis()),
            error_code: Some(error_codes::CIRCUIT_OPEN.to_string()),
            category: None,
            severity: None,
            retryable: true,
            retry_after: Some(retry_in),
            retry_count: item.retry_count,
            trigger: item.trigger,
            submitted_at: Utc::now(),
            response_snapshot: None,
        }
    }

    /// Short-circuited by the breaker; no call reached the external service
    pub fn is_circuit_open(&self) -> bool {
        self.error_code.as_deref() == Some(error_codes::CIRCUIT_OPEN)
    }
}

/// Filter for `StatusTracker::history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub subject_id: Option<String>,
    pub destination_id: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub since: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, result: &SubmissionResult) -> bool {
        if let Some(subject) = &self.subject_id {
            if &result.key.subject_id != subject {
                return false;
            }
        }
        if let Some(destination) = &self.destination_id {
            if &result.key.destination_id != destination {
                return false;
            }
        }
        if let Some(status) = self.status {
            if result.status != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if result.submitted_at < since {
                return false;
            }
        }
        true
    }
}
