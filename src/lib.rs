#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Submission Core
//!
//! Delivery core for reporting-period submissions to an external verification
//! service.
//!
//! ## Overview
//!
//! Report candidates are produced elsewhere (an [`services::Aggregator`]) and
//! checked by a [`services::ReadinessGate`]. This crate takes it from there:
//! every `(subject, period, destination)` is delivered at most once, in
//! priority order, within the service's rate limits, with failures
//! classified, backed off and retried.
//!
//! ## Key Features
//!
//! - **Deduplicating Priority Queue**: one live item per submission key
//! - **Bounded Concurrency**: at most `max_concurrent_submissions` attempts at once
//! - **Rate Limiting**: burst, per-minute and per-hour budgets plus server cooldowns
//! - **Circuit Breaking**: per-operation breakers with single-probe recovery
//! - **Retry Scheduling**: exponential backoff with jitter and Retry-After floors
//! - **Lifecycle Tracking**: state-machine checked records and status polling
//!
//! ## Module Organization
//!
//! - [`config`] - TOML configuration with environment overrides
//! - [`constants`] - Operation names, error codes and priorities
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//! - [`models`] - Keys, queue items, results and report payloads
//! - [`orchestration`] - Queue, submitter, scheduler and status tracking
//! - [`resilience`] - Rate limiter, circuit breakers and the resilience guard
//! - [`services`] - Interfaces to external collaborators
//! - [`state_machine`] - Submission lifecycle states and transitions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use submission_core::config::ConfigManager;
//! use submission_core::orchestration::{SchedulerDependencies, SubmissionScheduler};
//!
//! # async fn example(deps: SchedulerDependencies) -> Result<(), Box<dyn std::error::Error>> {
//! submission_core::logging::init_structured_logging();
//!
//! let manager = ConfigManager::load()?;
//! let scheduler = SubmissionScheduler::new(manager.config().clone(), deps)?;
//! scheduler.start().await?;
//!
//! // ... run until told to stop
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, ConfigurationError, SubmissionConfig};
pub use error::{Result, SubmissionError};
pub use models::{
    GateDecision, HistoryFilter, QueuedSubmission, ReportCandidate, SubmissionKey,
    SubmissionResult, SubmissionTrigger,
};
pub use orchestration::{
    DailyRunReport, QueueSnapshot, RetrySweepReport, SchedulerDependencies, ShutdownSignal,
    StatisticsSnapshot, SubmissionScheduler,
};
pub use services::{
    Aggregator, ExternalService, ReadinessGate, ServiceError, SubmissionRepository, SubmitReceipt,
};
pub use state_machine::{SubmissionEvent, SubmissionStatus};
