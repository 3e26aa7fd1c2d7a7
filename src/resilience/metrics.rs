//! Serializable views of breaker and limiter state, attached to scheduler
//! statistics.

use crate::resilience::{CircuitState, RateLimiterStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters for one operation's breaker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Outcomes recorded after a call was let through
    pub recorded_calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls refused while open or while a probe was already out
    pub short_circuited: u64,
    pub probes: u64,
    pub times_opened: u64,
    /// failures / recorded_calls, 0 before any call
    pub failure_rate: f64,
}

impl CircuitBreakerMetrics {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }
}

/// Every breaker plus the destination rate limiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceSnapshot {
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,
    pub rate_limiter: RateLimiterStatus,
}

impl ResilienceSnapshot {
    /// Operations currently failing fast, sorted by name
    pub fn open_operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .circuit_breakers
            .iter()
            .filter(|(_, metrics)| metrics.is_open())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::resilience::RateLimiter;

    #[test]
    fn test_open_operations_lists_only_open_breakers() {
        let open = CircuitBreakerMetrics {
            state: CircuitState::Open,
            times_opened: 1,
            ..CircuitBreakerMetrics::default()
        };
        let snapshot = ResilienceSnapshot {
            circuit_breakers: HashMap::from([
                ("submit".to_string(), open),
                ("status-poll".to_string(), CircuitBreakerMetrics::default()),
            ]),
            rate_limiter: RateLimiter::new(&RateLimitConfig::default()).status(),
        };

        assert_eq!(snapshot.open_operations(), vec!["submit"]);
    }
}
