//! # Circuit Breaker Manager
//!
//! Owns one breaker per logical operation name, created on first use from the
//! global thresholds or the operation's override.

use crate::config::CircuitBreakerConfig;
use crate::resilience::{CircuitBreaker, CircuitBreakerMetrics};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Registry of per-operation circuit breakers
#[derive(Debug)]
pub struct CircuitBreakerManager {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        info!(
            enabled = config.enabled,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown_seconds,
            overrides = config.operations.len(),
            "🛡️ Circuit breaker manager initialized"
        );
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// When disabled, callers skip breaker checks entirely
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get or create the breaker for an operation
    pub fn get(&self, operation: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(operation) {
            return existing.value().clone();
        }
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    operation,
                    self.config.settings_for_operation(operation),
                ))
            })
            .value()
            .clone()
    }

    pub fn allow(&self, operation: &str) -> bool {
        !self.is_enabled() || self.get(operation).allow()
    }

    pub fn record_success(&self, operation: &str) {
        if self.is_enabled() {
            self.get(operation).record_success();
        }
    }

    pub fn record_failure(&self, operation: &str) {
        if self.is_enabled() {
            self.get(operation).record_failure();
        }
    }

    /// Metrics for every breaker created so far
    pub fn metrics(&self) -> HashMap<String, CircuitBreakerMetrics> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerOperationConfig;
    use crate::resilience::CircuitState;

    #[test]
    fn test_breakers_are_isolated_per_operation() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..CircuitBreakerConfig::default()
        });

        manager.record_failure("submit");
        manager.record_failure("submit");
        assert_eq!(manager.get("submit").state(), CircuitState::Open);
        assert!(!manager.allow("submit"));
        assert!(manager.allow("status-poll"));
        assert!(Arc::ptr_eq(&manager.get("submit"), &manager.get("submit")));
    }

    #[test]
    fn test_override_applies_to_named_operation() {
        let mut config = CircuitBreakerConfig::default();
        config.operations.insert(
            "status-poll".to_string(),
            CircuitBreakerOperationConfig {
                failure_threshold: 1,
                cooldown_seconds: 5,
            },
        );
        let manager = CircuitBreakerManager::new(config);

        manager.record_failure("status-poll");
        assert_eq!(manager.get("status-poll").state(), CircuitState::Open);
        manager.record_failure("submit");
        assert_eq!(manager.get("submit").state(), CircuitState::Closed);
        assert_eq!(manager.metrics().len(), 2);
    }

    #[test]
    fn test_disabled_manager_always_allows() {
        let manager = CircuitBreakerManager::new(CircuitBreakerConfig {
            enabled: false,
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        manager.record_failure("submit");
        manager.record_failure("submit");
        assert!(manager.allow("submit"));
    }
}
