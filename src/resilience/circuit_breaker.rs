//! # Circuit Breaker Implementation
//!
//! Per-operation fault isolation for calls to the external service. Three
//! states: Closed (normal operation), Open (failing fast) and Half-Open (a
//! single probe call tests recovery).
//!
//! The Open to Half-Open move is evaluated lazily inside [`CircuitBreaker::allow`];
//! no background timer is involved.

use crate::resilience::CircuitBreakerMetrics;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    #[default]
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - exactly one probe call is allowed
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Thresholds for one breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Time since the last failure before a probe is allowed
    pub cooldown: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.cooldown.is_zero() {
            return Err("cooldown must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// Set while the half-open probe is outstanding
    probe_started_at: Option<Instant>,
    metrics: CircuitBreakerMetrics,
}

/// Failure-counting breaker for a single operation name.
///
/// All state lives behind one mutex so the check-and-advance in `allow` and
/// the outcome recording are atomic with respect to each other.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: String,
    settings: CircuitBreakerSettings,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(operation: impl Into<String>, settings: CircuitBreakerSettings) -> Self {
        let operation = operation.into();
        debug!(
            operation = %operation,
            failure_threshold = settings.failure_threshold,
            cooldown_seconds = settings.cooldown.as_secs(),
            "🛡️ Circuit breaker initialized"
        );

        Self {
            operation,
            settings,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                probe_started_at: None,
                metrics: CircuitBreakerMetrics::default(),
            }),
        }
    }

    /// Stored state; an Open circuit whose cooldown has elapsed still reads
    /// Open until the next `allow`
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Decide whether a call may go ahead, advancing Open to Half-Open once
    /// the cooldown has elapsed. In Half-Open only the first caller is let
    /// through; a probe that never reports back is replaced after another
    /// cooldown.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure_at
                    .map(|at| now.duration_since(at) > self.settings.cooldown)
                    .unwrap_or(true);

                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started_at = Some(now);
                    inner.metrics.probes += 1;
                    info!(
                        operation = %self.operation,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    true
                } else {
                    inner.metrics.short_circuited += 1;
                    false
                }
            }
            CircuitState::HalfOpen => {
                let stale_probe = inner
                    .probe_started_at
                    .map(|at| now.duration_since(at) > self.settings.cooldown)
                    .unwrap_or(true);

                if stale_probe {
                    inner.probe_started_at = Some(now);
                    inner.metrics.probes += 1;
                    true
                } else {
                    inner.metrics.short_circuited += 1;
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.recorded_calls += 1;
        inner.metrics.successes += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.probe_started_at = None;
                info!(
                    operation = %self.operation,
                    recorded_calls = inner.metrics.recorded_calls,
                    "🟢 Circuit breaker closed (recovered)"
                );
            }
            CircuitState::Open => {
                warn!(operation = %self.operation, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.metrics.recorded_calls += 1;
        inner.metrics.failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                inner.probe_started_at = None;
                self.open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    /// Give up a half-open probe without an outcome (the call never ran)
    pub fn abandon_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            inner.probe_started_at = None;
            // Keep the circuit eligible for an immediate new probe
            inner.last_failure_at = Instant::now().checked_sub(self.settings.cooldown * 2);
        }
    }

    /// Time left before an Open circuit admits a probe
    pub fn remaining_cooldown(&self) -> Duration {
        let inner = self.inner.lock();
        match (inner.state, inner.last_failure_at) {
            (CircuitState::Open, Some(at)) => self
                .settings
                .cooldown
                .saturating_sub(Instant::now().duration_since(at)),
            _ => Duration::ZERO,
        }
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        let mut snapshot = inner.metrics.clone();
        snapshot.state = inner.state;
        snapshot.consecutive_failures = inner.consecutive_failures;
        if snapshot.recorded_calls > 0 {
            snapshot.failure_rate = snapshot.failures as f64 / snapshot.recorded_calls as f64;
        }
        snapshot
    }

    fn open(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.metrics.times_opened += 1;
        error!(
            operation = %self.operation,
            consecutive_failures = inner.consecutive_failures,
            failure_threshold = self.settings.failure_threshold,
            cooldown_seconds = self.settings.cooldown.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
        crate::logging::log_resilience_event(
            "circuit_breaker",
            &self.operation,
            "opened",
            None,
        );
    }
}
