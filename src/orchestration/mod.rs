//! # Orchestration Engine
//!
//! Delivery core for report submissions: queueing, attempts, retries and
//! lifecycle tracking.
//!
//! ## Core Components
//!
//! - **SubmissionScheduler**: Owns the queue and runs the daily and processor loops
//! - **SubmissionQueue**: Deduplicating priority queue with in-flight tracking
//! - **Submitter**: One guarded attempt against the external service
//! - **ErrorClassifier**: Maps service failures to categories, codes and severity
//! - **RetryPolicy**: Backoff delays and retry/no-retry decisions
//! - **StatusTracker**: Latest record per key, status polling, persistence
//! - **SubmissionStatistics**: Outcome counters and health score
//! - **ShutdownSignal**: Cooperative shutdown shared by every loop and sleep

pub mod error_classifier;
pub mod queue;
pub mod retry_policy;
pub mod scheduler;
pub mod shutdown;
pub mod statistics;
pub mod status_tracker;
pub mod submitter;

pub use error_classifier::{
    ErrorCategory, ErrorClassification, ErrorClassifier, ErrorContext, ErrorSeverity,
    StandardErrorClassifier,
};
pub use queue::{EnqueueRejection, SubmissionQueue};
pub use retry_policy::{parse_retry_after, should_retry, BackoffHints, RetryPolicy};
pub use scheduler::{
    next_daily_run, previous_day_start, DailyRunReport, QueueItemSummary, QueueSnapshot,
    RetrySweepReport, SchedulerDependencies, SubmissionScheduler,
};
pub use shutdown::ShutdownSignal;
pub use statistics::{StatisticsSnapshot, SubmissionStatistics};
pub use status_tracker::StatusTracker;
pub use submitter::Submitter;
