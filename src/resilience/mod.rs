//! # Resilience Module
//!
//! Protection for calls to the external verification service.
//!
//! ## Architecture
//!
//! - **Rate Limiter**: burst, per-minute and per-hour budgets plus a cooldown
//!   tripped by the service's own rate-limit responses
//! - **Circuit Breakers**: one per logical operation (`submit`, `status-poll`),
//!   created on demand by the [`CircuitBreakerManager`]
//! - **Resilience Guard**: the interceptor that composes both around a call
//! - **Metrics**: snapshots for statistics and health reporting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use submission_core::config::SubmissionConfig;
//! use submission_core::orchestration::ShutdownSignal;
//! use submission_core::resilience::{CircuitBreakerManager, RateLimiter, ResilienceGuard};
//! use submission_core::services::ServiceError;
//!
//! # async fn example() {
//! let config = SubmissionConfig::default();
//! let guard = ResilienceGuard::new(
//!     Arc::new(CircuitBreakerManager::new(config.circuit_breaker.clone())),
//!     Arc::new(RateLimiter::new(&config.rate_limit)),
//!     ShutdownSignal::new(),
//! );
//!
//! let result = guard
//!     .execute("submit", || async { Ok::<_, ServiceError>("doc-123") })
//!     .await;
//! # let _ = result;
//! # }
//! ```

pub mod circuit_breaker;
pub mod guard;
pub mod manager;
pub mod metrics;
pub mod rate_limiter;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSettings, CircuitState};
pub use guard::{GuardError, GuardedFailure, ResilienceGuard};
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, ResilienceSnapshot};
pub use rate_limiter::{RateLimiter, RateLimiterStatus};
