//! Circuit Breaker
//!
//! Per-provider-instance breaker: opens after a run of consecutive failures
//! inside a rolling window, probes half-open after a cooldown, and closes
//! again on a single success. While open, calls fail immediately without
//! any network I/O.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker state observed by a call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow through normally
    Closed,
    /// Calls fail fast
    Open,
    /// A single probe call is allowed through
    HalfOpen,
}

/// Breaker thresholds
#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,

    /// Window in which the failures must occur
    pub failure_window: Duration,

    /// Time the breaker stays open before a half-open probe
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    window_start: Option<Instant>,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                window_start: None,
                opened_at: None,
            }),
        }
    }

    /// State a new call should observe; transitions Open → HalfOpen once
    /// the cooldown has elapsed
    pub fn check(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == BreakerState::Open {
            let cooled = inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.cooldown);
            if cooled {
                inner.state = BreakerState::HalfOpen;
            }
        }
        inner.state
    }

    /// Record a successful call; closes the breaker and clears the window
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.window_start = None;
        inner.opened_at = None;
    }

    /// Record a failed call; a half-open probe failure re-opens immediately
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(now);
            return;
        }

        // Restart the counting window when the previous one has expired
        let window_live = inner
            .window_start
            .is_some_and(|start| now.duration_since(start) <= self.config.failure_window);
        if !window_live {
            inner.window_start = Some(now);
            inner.consecutive_failures = 0;
        }

        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.config.failure_threshold {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(now);
        }
    }
}
