// ABOUTME: Retry policy for artifact copies: attempt bound and exponential backoff.
// ABOUTME: Only the copy step is retried; build, resolve, and restart failures are terminal.

use crate::config::BackoffConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total copy attempts, including the first. Never below 1.
    pub max_attempts: u32,
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            factor: 2,
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(retries: u32, backoff: &BackoffConfig) -> Self {
        Self {
            max_attempts: retries.max(1),
            base: backoff.base,
            factor: backoff.factor,
            cap: backoff.cap,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based):
    /// `base * factor^(attempt - 1)`, capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base.saturating_mul(multiplier).min(self.cap)
    }
}
