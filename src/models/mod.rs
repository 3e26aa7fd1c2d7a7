pub mod report;
pub mod submission;

// Re-export core models for easy access
pub use report::{GateDecision, ReportCandidate};
pub use submission::{
    HistoryFilter, QueuedSubmission, SubmissionKey, SubmissionResult, SubmissionTrigger,
};
