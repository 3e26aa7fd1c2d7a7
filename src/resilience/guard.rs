//! # Resilience Guard
//!
//! Interceptor composed around a single external call: circuit breaker check,
//! rate-limit wait, the call itself, then outcome recording on both. A failed
//! call hands its rate-limit slot back. The
//! submitter and the status poller go through the same guard, each under its
//! own operation name.

use crate::orchestration::shutdown::ShutdownSignal;
use crate::resilience::{CircuitBreakerManager, RateLimiter, ResilienceSnapshot};
use crate::services::ServiceError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Failures that can tell the guard the remote side is rate limiting
pub trait GuardedFailure {
    fn is_rate_limited(&self) -> bool;
}

impl GuardedFailure for ServiceError {
    fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }
}

/// Why a guarded call did not produce the callee's own result
#[derive(Debug, thiserror::Error)]
pub enum GuardError<E> {
    /// Breaker refused the call; nothing was sent
    #[error("Circuit breaker is open for {operation}")]
    CircuitOpen {
        operation: String,
        retry_in: Duration,
    },

    /// Shutdown arrived while waiting for rate-limit budget
    #[error("Shutdown requested while waiting to call {operation}")]
    Interrupted { operation: String },

    /// The call ran and failed
    #[error(transparent)]
    Failed(E),
}

/// Breakers plus rate limiter for one external destination
#[derive(Debug, Clone)]
pub struct ResilienceGuard {
    breakers: Arc<CircuitBreakerManager>,
    rate_limiter: Arc<RateLimiter>,
    shutdown: ShutdownSignal,
}

impl ResilienceGuard {
    pub fn new(
        breakers: Arc<CircuitBreakerManager>,
        rate_limiter: Arc<RateLimiter>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            breakers,
            rate_limiter,
            shutdown,
        }
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Run `call` under the breaker for `operation` and the shared rate limiter.
    ///
    /// The rate-limit wait is bounded by the limiter's own wait time and is
    /// cancelled by shutdown; the call itself is never interrupted.
    pub async fn execute<F, Fut, T, E>(&self, operation: &str, call: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: GuardedFailure,
    {
        if !self.breakers.allow(operation) {
            let retry_in = self.breakers.get(operation).remaining_cooldown();
            debug!(
                operation = operation,
                retry_in_ms = retry_in.as_millis() as u64,
                "Call short-circuited by open breaker"
            );
            return Err(GuardError::CircuitOpen {
                operation: operation.to_string(),
                retry_in,
            });
        }

        let Some(reserved_at) = self.wait_for_budget(operation).await else {
            if self.breakers.is_enabled() {
                self.breakers.get(operation).abandon_probe();
            }
            return Err(GuardError::Interrupted {
                operation: operation.to_string(),
            });
        };

        match call().await {
            Ok(value) => {
                self.breakers.record_success(operation);
                Ok(value)
            }
            Err(error) => {
                self.breakers.record_failure(operation);
                self.rate_limiter.release(reserved_at);
                if error.is_rate_limited() {
                    self.rate_limiter.trip_cooldown();
                    crate::logging::log_resilience_event(
                        "rate_limiter",
                        operation,
                        "cooldown_tripped",
                        Some("remote service reported rate limiting"),
                    );
                }
                Err(GuardError::Failed(error))
            }
        }
    }

    pub fn snapshot(&self) -> ResilienceSnapshot {
        ResilienceSnapshot {
            circuit_breakers: self.breakers.metrics(),
            rate_limiter: self.rate_limiter.status(),
        }
    }

    /// Reserve a rate-limit slot, sleeping as long as the limiter asks.
    /// None if shutdown interrupts the wait.
    async fn wait_for_budget(&self, operation: &str) -> Option<Instant> {
        loop {
            match self.rate_limiter.try_acquire() {
                Ok(reserved_at) => return Some(reserved_at),
                Err(wait) => {
                    warn!(
                        operation = operation,
                        wait_ms = wait.as_millis() as u64,
                        "⏳ Rate limited, waiting before call"
                    );
                    let wait = wait.max(Duration::from_millis(1));
                    if !self.shutdown.sleep(wait).await {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RateLimitConfig};
    use crate::resilience::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn guard(burst: usize, threshold: u32) -> (ResilienceGuard, ShutdownSignal) {
        let shutdown = ShutdownSignal::new();
        let guard = ResilienceGuard::new(
            Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig {
                failure_threshold: threshold,
                ..CircuitBreakerConfig::default()
            })),
            Arc::new(RateLimiter::new(&RateLimitConfig {
                burst,
                ..RateLimitConfig::default()
            })),
            shutdown.clone(),
        );
        (guard, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_skips_call() {
        let (guard, _) = guard(10, 1);
        let calls = AtomicU32::new(0);

        let first: Result<(), _> = guard
            .execute("submit", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::http(503, "unavailable"))
            })
            .await;
        assert!(matches!(first, Err(GuardError::Failed(_))));

        let second: Result<(), GuardError<ServiceError>> = guard
            .execute("submit", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        match second {
            Err(GuardError::CircuitOpen { retry_in, .. }) => {
                assert!(retry_in > Duration::ZERO && retry_in <= Duration::from_secs(60));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_response_trips_cooldown() {
        let (guard, _) = guard(10, 5);
        let result: Result<(), _> = guard
            .execute("submit", || async { Err(ServiceError::http(429, "slow down")) })
            .await;
        assert!(result.is_err());
        assert!(!guard.rate_limiter().can_proceed());
        assert_eq!(
            guard.rate_limiter().status().cooldown_remaining,
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_budget_then_calls() {
        let (guard, _) = guard(1, 5);
        let first: Result<u8, GuardError<ServiceError>> =
            guard.execute("submit", || async { Ok(1) }).await;
        assert_eq!(first.unwrap(), 1);

        let started = tokio::time::Instant::now();
        let second: Result<u8, GuardError<ServiceError>> =
            guard.execute("submit", || async { Ok(2) }).await;
        assert_eq!(second.unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_budget_wait() {
        let (guard, shutdown) = guard(1, 5);
        let _: Result<(), GuardError<ServiceError>> =
            guard.execute("submit", || async { Ok(()) }).await;

        let pending = {
            let guard = guard.clone();
            tokio::spawn(async move {
                guard
                    .execute("submit", || async { Ok::<(), ServiceError>(()) })
                    .await
            })
        };
        tokio::task::yield_now().await;
        shutdown.request();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(GuardError::Interrupted { .. })));
        assert_eq!(guard.breakers().get("submit").state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_calls_do_not_spend_budget() {
        let (guard, _) = guard(2, 5);
        for _ in 0..2 {
            let result: Result<(), _> = guard
                .execute("submit", || async { Err(ServiceError::http(503, "unavailable")) })
                .await;
            assert!(matches!(result, Err(GuardError::Failed(_))));
        }

        let status = guard.rate_limiter().status();
        assert_eq!(status.burst_count, 0);
        assert!(status.can_proceed);
        assert_eq!(status.wait_time, Duration::ZERO);

        let started = Instant::now();
        let ok: Result<u8, GuardError<ServiceError>> =
            guard.execute("submit", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(guard.rate_limiter().status().burst_count, 1);
    }
}
