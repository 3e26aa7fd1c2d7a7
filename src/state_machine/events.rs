use super::states::SubmissionStatus;
use serde::{Deserialize, Serialize};

/// Events that move a submission through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubmissionEvent {
    /// External service accepted the submission
    Accept,
    /// External service reports the document under review
    StartProcessing,
    Verify,
    Reject,
    Expire,
    /// Permanent error or retries exhausted
    Fail(String),
    /// Attempt failed and another one is scheduled
    ScheduleRetry,
    /// Retry sweep re-opens a failed submission
    Requeue,
}

impl SubmissionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::StartProcessing => "start_processing",
            Self::Verify => "verify",
            Self::Reject => "reject",
            Self::Expire => "expire",
            Self::Fail(_) => "fail",
            Self::ScheduleRetry => "schedule_retry",
            Self::Requeue => "requeue",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Event that would move a submission into `status`; `None` for `Pending`,
    /// which is never reached from an external report.
    pub fn toward(status: SubmissionStatus) -> Option<Self> {
        match status {
            SubmissionStatus::Pending => None,
            SubmissionStatus::Submitted => Some(Self::Accept),
            SubmissionStatus::Processing => Some(Self::StartProcessing),
            SubmissionStatus::Verified => Some(Self::Verify),
            SubmissionStatus::Rejected => Some(Self::Reject),
            SubmissionStatus::Expired => Some(Self::Expire),
            SubmissionStatus::Failed => Some(Self::Fail("reported failed by external service".into())),
        }
    }
}
