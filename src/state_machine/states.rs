use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of one submission key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Known to the system but not yet accepted by the external service
    Pending,
    /// Accepted by the external service
    Submitted,
    /// External service is reviewing the document
    Processing,
    /// External service verified the document
    Verified,
    /// External service rejected the document
    Rejected,
    /// Document expired before verification
    Expired,
    /// Permanent error or retries exhausted
    Failed,
}

impl SubmissionStatus {
    /// Check if this is a terminal state (no further transitions expected)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Verified | Self::Rejected | Self::Expired | Self::Failed
        )
    }

    /// Accepted by the external service; a key in one of these states is never
    /// enqueued again
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Submitted | Self::Processing | Self::Verified)
    }

    /// Map the external service's status vocabulary. Unrecognised values map to
    /// `Pending` so an unknown answer never closes a submission.
    pub fn from_external(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::Submitted,
            "PENDING" | "IN_PROGRESS" | "PROCESSING" => Self::Processing,
            "VERIFIED" | "APPROVED" => Self::Verified,
            "REJECTED" => Self::Rejected,
            "FAILED" | "ERROR" => Self::Failed,
            "EXPIRED" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Submitted => write!(f, "submitted"),
            Self::Processing => write!(f, "processing"),
            Self::Verified => write!(f, "verified"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "processing" => Ok(Self::Processing),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid submission status: {s}")),
        }
    }
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(SubmissionStatus::Verified.is_terminal());
        assert!(SubmissionStatus::Rejected.is_terminal());
        assert!(SubmissionStatus::Expired.is_terminal());
        assert!(SubmissionStatus::Failed.is_terminal());
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(!SubmissionStatus::Submitted.is_terminal());
        assert!(!SubmissionStatus::Processing.is_terminal());
    }

    #[test]
    fn test_external_status_mapping() {
        assert_eq!(SubmissionStatus::from_external("NEW"), SubmissionStatus::Submitted);
        assert_eq!(
            SubmissionStatus::from_external("in_progress"),
            SubmissionStatus::Processing
        );
        assert_eq!(
            SubmissionStatus::from_external("Approved"),
            SubmissionStatus::Verified
        );
        assert_eq!(SubmissionStatus::from_external("ERROR"), SubmissionStatus::Failed);
        assert_eq!(
            SubmissionStatus::from_external("EXPIRED"),
            SubmissionStatus::Expired
        );
        assert_eq!(
            SubmissionStatus::from_external("SOMETHING_NEW"),
            SubmissionStatus::Pending
        );
        assert_eq!(SubmissionStatus::from_external(""), SubmissionStatus::Pending);
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(SubmissionStatus::Processing.to_string(), "processing");
        assert_eq!(
            "verified".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Verified
        );
        assert!("unknown".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&SubmissionStatus::Submitted).unwrap();
        assert_eq!(json, "\"submitted\"");
        let parsed: SubmissionStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(parsed, SubmissionStatus::Expired);
    }
}
