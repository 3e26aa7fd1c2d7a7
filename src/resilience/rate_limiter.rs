//! # Rate Limiter
//!
//! Sliding-window request budgets for one external destination: a short burst
//! window, a one-minute window and a one-hour window, plus an explicit cooldown
//! tripped when the service itself reports that it is rate limiting us.
//!
//! Windows are timestamp queues pruned lazily on every check. All mutation
//! happens under a single per-instance mutex.

use crate::config::RateLimitConfig;
use crate::constants::windows;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct Window {
    length: Duration,
    limit: usize,
    entries: VecDeque<Instant>,
}

impl Window {
    fn new(length: Duration, limit: usize) -> Self {
        Self {
            length,
            limit,
            entries: VecDeque::with_capacity(limit.min(1024)),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.entries.front() {
            if now.duration_since(*oldest) >= self.length {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop the entry stamped `at`, newest first
    fn release(&mut self, at: Instant) {
        if let Some(position) = self.entries.iter().rposition(|entry| *entry == at) {
            self.entries.remove(position);
        }
    }

    fn is_saturated(&self) -> bool {
        self.entries.len() >= self.limit
    }

    /// Time until the oldest entry leaves a saturated window
    fn wait_time(&self, now: Instant) -> Duration {
        if !self.is_saturated() {
            return Duration::ZERO;
        }
        self.entries
            .front()
            .map(|oldest| self.length.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug)]
struct LimiterState {
    burst: Window,
    minute: Window,
    hour: Window,
    cooldown_until: Option<Instant>,
}

impl LimiterState {
    fn prune(&mut self, now: Instant) {
        self.burst.prune(now);
        self.minute.prune(now);
        self.hour.prune(now);
        if matches!(self.cooldown_until, Some(until) if now >= until) {
            self.cooldown_until = None;
        }
    }

    fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    fn can_proceed(&self, now: Instant) -> bool {
        self.cooldown_remaining(now).is_zero()
            && !self.burst.is_saturated()
            && !self.minute.is_saturated()
            && !self.hour.is_saturated()
    }

    fn wait_time(&self, now: Instant) -> Duration {
        [
            self.burst.wait_time(now),
            self.minute.wait_time(now),
            self.hour.wait_time(now),
            self.cooldown_remaining(now),
        ]
        .into_iter()
        .max()
        .unwrap_or(Duration::ZERO)
    }

    fn record(&mut self, now: Instant) {
        self.burst.entries.push_back(now);
        self.minute.entries.push_back(now);
        self.hour.entries.push_back(now);
    }

    fn release(&mut self, at: Instant) {
        self.burst.release(at);
        self.minute.release(at);
        self.hour.release(at);
    }
}

/// Point-in-time view of the limiter for statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterStatus {
    pub burst_count: usize,
    pub burst_limit: usize,
    pub minute_count: usize,
    pub minute_limit: usize,
    pub hour_count: usize,
    pub hour_limit: usize,
    pub cooldown_remaining: Duration,
    pub wait_time: Duration,
    pub can_proceed: bool,
}

/// Three-window rate limiter with cooldown
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            state: Mutex::new(LimiterState {
                burst: Window::new(config.burst_window(), config.burst),
                minute: Window::new(Duration::from_secs(windows::MINUTE_SECONDS), config.per_minute),
                hour: Window::new(Duration::from_secs(windows::HOUR_SECONDS), config.per_hour),
                cooldown_until: None,
            }),
        }
    }

    /// False while any window is saturated or the cooldown is active
    pub fn can_proceed(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now);
        state.can_proceed(now)
    }

    /// Record one request against every window
    pub fn record(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now);
        state.record(now);
    }

    /// How long to sleep before checking again; zero when a request may go now
    pub fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now);
        state.wait_time(now)
    }

    /// Check and record in one step. Returns the wait time when the budget is
    /// exhausted, so concurrent callers cannot overshoot a window. The returned
    /// stamp identifies the reservation for [`RateLimiter::release`].
    pub fn try_acquire(&self) -> Result<Instant, Duration> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now);
        if state.can_proceed(now) {
            state.record(now);
            Ok(now)
        } else {
            let wait = state.wait_time(now);
            debug!(wait_ms = wait.as_millis() as u64, "Rate limit budget exhausted");
            Err(wait)
        }
    }

    /// Give back a slot taken by `try_acquire`. Only successful calls count
    /// against the budget.
    pub fn release(&self, reserved_at: Instant) {
        self.state.lock().release(reserved_at);
    }

    /// The service told us to back off; block every request for the cooldown
    pub fn trip_cooldown(&self) {
        let now = Instant::now();
        let until = now + self.cooldown;
        let mut state = self.state.lock();
        state.cooldown_until = Some(match state.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        warn!(
            cooldown_seconds = self.cooldown.as_secs(),
            "⏳ Rate limit cooldown tripped"
        );
    }

    pub fn status(&self) -> RateLimiterStatus {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.prune(now);
        RateLimiterStatus {
            burst_count: state.burst.entries.len(),
            burst_limit: state.burst.limit,
            minute_count: state.minute.entries.len(),
            minute_limit: state.minute.limit,
            hour_count: state.hour.entries.len(),
            hour_limit: state.hour.limit,
            cooldown_remaining: state.cooldown_remaining(now),
            wait_time: state.wait_time(now),
            can_proceed: state.can_proceed(now),
        }
    }
}
