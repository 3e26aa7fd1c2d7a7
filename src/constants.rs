//! # System Constants
//!
//! Operation names, error codes and queue priorities shared by the queue,
//! submitter, scheduler and status tracker.

/// Logical operation names used to key circuit breakers and log records
pub mod operations {
    /// Submitting a report to the external verification service
    pub const SUBMIT: &str = "submit";
    /// Querying the external service for a document's status
    pub const STATUS_POLL: &str = "status-poll";
}

/// Error codes carried on `SubmissionResult::error_code`
pub mod error_codes {
    pub const CIRCUIT_OPEN: &str = "CIRCUIT_OPEN";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const AUTH_REFRESH_FAILED: &str = "AUTH_REFRESH_FAILED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNPROCESSABLE: &str = "UNPROCESSABLE_ENTITY";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const CANDIDATE_UNAVAILABLE: &str = "CANDIDATE_UNAVAILABLE";
    pub const RETRY_LIMIT_EXCEEDED: &str = "RETRY_LIMIT_EXCEEDED";
    pub const SHUTDOWN_INTERRUPTED: &str = "SHUTDOWN_INTERRUPTED";

    /// Error code for an HTTP status without a dedicated code
    pub fn http(status: u16) -> String {
        format!("HTTP_{status}")
    }
}

/// Queue priorities per trigger; higher dequeues first
pub mod priorities {
    pub const MANUAL: i32 = 0;
    pub const SCHEDULE: i32 = 1;
    pub const THRESHOLD: i32 = 1;
    pub const RETRY: i32 = 2;
}

/// Window lengths for the three rate limiter granularities (seconds)
pub mod windows {
    pub const BURST_SECONDS: u64 = 10;
    pub const MINUTE_SECONDS: u64 = 60;
    pub const HOUR_SECONDS: u64 = 3600;
}

/// Longest single sleep of the daily trigger loop
pub const MAX_DAILY_SLEEP_SECONDS: u64 = 3600;

/// Pause after an unexpected error in a background loop before resuming
pub const LOOP_ERROR_BACKOFF_SECONDS: u64 = 300;
