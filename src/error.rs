//! Error types for the submission core.

use crate::config::ConfigurationError;
use crate::services::ServiceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Repository error: {0}")]
    RepositoryError(String),
    #[error("External service error: {0}")]
    ServiceError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Scheduler error: {0}")]
    SchedulerError(String),
    #[error("Shutdown in progress: {0}")]
    ShuttingDown(String),
}

impl From<ConfigurationError> for SubmissionError {
    fn from(error: ConfigurationError) -> Self {
        SubmissionError::ConfigurationError(error.to_string())
    }
}

impl From<ServiceError> for SubmissionError {
    fn from(error: ServiceError) -> Self {
        SubmissionError::ServiceError(error.to_string())
    }
}

impl From<serde_json::Error> for SubmissionError {
    fn from(error: serde_json::Error) -> Self {
        SubmissionError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, SubmissionError>;
