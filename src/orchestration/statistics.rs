//! # Submission Statistics
//!
//! Running counters over attempt outcomes. Breaker short-circuits are counted
//! on their own and never as failures, so an open circuit does not inflate
//! the error figures it was opened to contain.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::SubmissionResult;
use crate::resilience::ResilienceSnapshot;

#[derive(Debug, Default)]
struct Counters {
    total_attempts: u64,
    successful: u64,
    failed: u64,
    circuit_short_circuits: u64,
    recoveries: u64,
    retries_scheduled: u64,
    terminal_failures: u64,
    by_category: HashMap<String, u64>,
    by_severity: HashMap<String, u64>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Point-in-time view returned by `SubmissionScheduler::statistics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed: u64,
    pub circuit_short_circuits: u64,
    /// Successful attempts that followed at least one failure
    pub recoveries: u64,
    pub retries_scheduled: u64,
    pub terminal_failures: u64,
    pub failures_by_category: HashMap<String, u64>,
    pub failures_by_severity: HashMap<String, u64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub queue_length: usize,
    pub in_flight: usize,
    pub active_workers: usize,
    /// `100 * (1 - failed / (failed + recoveries + 1))`
    pub health_score: f64,
    pub resilience: ResilienceSnapshot,
}

impl StatisticsSnapshot {
    pub fn success_rate(&self) -> f64 {
        let counted = self.successful + self.failed;
        if counted == 0 {
            return 1.0;
        }
        self.successful as f64 / counted as f64
    }
}

/// Thread-safe outcome counters
#[derive(Debug, Default)]
pub struct SubmissionStatistics {
    counters: Mutex<Counters>,
}

impl SubmissionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt outcome
    pub fn record_attempt(&self, result: &SubmissionResult) {
        let mut counters = self.counters.lock();
        counters.total_attempts += 1;

        if result.is_circuit_open() {
            counters.circuit_short_circuits += 1;
            return;
        }

        if result.success {
            counters.successful += 1;
            counters.last_success_at = Some(result.submitted_at);
            if result.retry_count > 0 {
                counters.recoveries += 1;
            }
            return;
        }

        counters.failed += 1;
        counters.last_failure_at = Some(result.submitted_at);
        if let Some(category) = result.category {
            *counters.by_category.entry(category.to_string()).or_default() += 1;
        }
        if let Some(severity) = result.severity {
            *counters.by_severity.entry(severity.to_string()).or_default() += 1;
        }
    }

    pub fn record_retry_scheduled(&self) {
        self.counters.lock().retries_scheduled += 1;
    }

    pub fn record_terminal_failure(&self) {
        self.counters.lock().terminal_failures += 1;
    }

    pub fn health_score(&self) -> f64 {
        let counters = self.counters.lock();
        health_score(counters.failed, counters.recoveries)
    }

    /// Combine counters with queue and resilience state
    pub fn snapshot(
        &self,
        queue_length: usize,
        in_flight: usize,
        active_workers: usize,
        resilience: ResilienceSnapshot,
    ) -> StatisticsSnapshot {
        let counters = self.counters.lock();
        StatisticsSnapshot {
            total_attempts: counters.total_attempts,
            successful: counters.successful,
            failed: counters.failed,
            circuit_short_circuits: counters.circuit_short_circuits,
            recoveries: counters.recoveries,
            retries_scheduled: counters.retries_scheduled,
            terminal_failures: counters.terminal_failures,
            failures_by_category: counters.by_category.clone(),
            failures_by_severity: counters.by_severity.clone(),
            last_success_at: counters.last_success_at,
            last_failure_at: counters.last_failure_at,
            queue_length,
            in_flight,
            active_workers,
            health_score: health_score(counters.failed, counters.recoveries),
            resilience,
        }
    }
}

fn health_score(errors: u64, recoveries: u64) -> f64 {
    let errors = errors as f64;
    100.0 * (1.0 - errors / (errors + recoveries as f64 + 1.0))
}
