//! # External Collaborators
//!
//! Narrow interfaces to everything outside the delivery core: the aggregation
//! side that builds report candidates, the readiness gate, the external
//! verification service and the submission record store.

pub mod memory;

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;
use crate::models::{GateDecision, ReportCandidate, SubmissionResult};
use crate::orchestration::retry_policy::parse_retry_after;

pub use memory::InMemorySubmissionRepository;

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Non-success response from the external service
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Credential refresh failed: {0}")]
    CredentialRefresh(String),

    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// HTTP failure carrying a raw `Retry-After` header value (seconds or
    /// HTTP-date); unparseable values are dropped
    pub fn http_with_retry_after(status: u16, message: impl Into<String>, header: &str) -> Self {
        Self::Http {
            status,
            message: message.into(),
            retry_after: parse_retry_after(header),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Receipt for a submission the external service accepted
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub external_id: String,
    pub raw_status: String,
    pub response: Option<serde_json::Value>,
}

/// Produces report candidates for subjects and periods
#[async_trait::async_trait]
pub trait Aggregator: Send + Sync {
    /// Build the payload for one subject and period
    async fn build_candidate(
        &self,
        subject_id: &str,
        period_start: DateTime<Utc>,
    ) -> std::result::Result<ReportCandidate, ServiceError>;

    /// Subjects with data for the period
    async fn active_subjects(
        &self,
        period_start: DateTime<Utc>,
    ) -> std::result::Result<Vec<String>, ServiceError>;
}

/// Business-rule thresholds deciding whether a candidate is ready to submit
#[async_trait::async_trait]
pub trait ReadinessGate: Send + Sync {
    async fn evaluate(&self, candidate: &ReportCandidate) -> GateDecision;
}

/// The external verification platform
#[async_trait::async_trait]
pub trait ExternalService: Send + Sync {
    async fn submit(
        &self,
        payload: &ReportCandidate,
        destination_id: &str,
    ) -> std::result::Result<SubmitReceipt, ServiceError>;

    /// Raw status string in the service's own vocabulary
    async fn query_status(
        &self,
        external_id: &str,
        destination_id: &str,
    ) -> std::result::Result<String, ServiceError>;

    /// Obtain fresh credentials after an authentication failure
    async fn refresh_credentials(
        &self,
        destination_id: &str,
    ) -> std::result::Result<(), ServiceError> {
        Err(ServiceError::CredentialRefresh(format!(
            "credential refresh not supported for {destination_id}"
        )))
    }
}

/// Store for submission records
#[async_trait::async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Insert or replace the record for `result.key`
    async fn save(&self, result: &SubmissionResult) -> Result<()>;

    /// Every stored record
    async fn list(&self) -> Result<Vec<SubmissionResult>>;
}
