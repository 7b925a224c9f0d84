//! Retry & Backoff Policy
//!
//! Exponential backoff with jitter. The attempt budget depends on the error
//! kind: transient failures get the full budget, rate limits a single
//! retry, content bugs none.

use std::time::Duration;

use rand::Rng;

use crate::error::ProviderError;

/// Retry policy for provider calls
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// Multiplier applied per subsequent retry
    pub factor: u32,

    /// Maximum attempts (including the first) for retryable errors
    pub max_attempts: u32,

    /// Jitter fraction applied symmetrically (0.2 = ±20%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            factor: 2,
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Attempts permitted (including the first) when `err` was observed
    ///
    /// `Unavailable` and `Timeout` get the full budget. `RateLimited` is
    /// retried once at most. Content bugs (`InvalidResponse`,
    /// `EmptyResponse`) and terminal kinds are never retried.
    pub const fn attempts_for(&self, err: &ProviderError) -> u32 {
        match err {
            ProviderError::Unavailable(_) | ProviderError::Timeout { .. } => self.max_attempts,
            ProviderError::RateLimited(_) => 2,
            _ => 1,
        }
    }

    /// Backoff delay before attempt number `attempt` (2-based: the first
    /// retry is attempt 2), with symmetric jitter applied
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2);
        let exact = self.base_delay.as_secs_f64() * f64::from(self.factor).powi(exponent as i32);
        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(exact);
        }
        let swing = rand::thread_rng().gen_range(-self.jitter..self.jitter);
        Duration::from_secs_f64((exact * (1.0 + swing)).max(0.0))
    }
}
