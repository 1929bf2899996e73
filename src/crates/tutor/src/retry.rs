//! Retry policy with exponential backoff
//!
//! The engine never retries on its own. When an evaluation or remediation
//! call fails, the session service re-drives the run under this policy.

use lesson_engine::WorkflowError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of re-drives after the first failure
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any delay
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Policy that surfaces every failure immediately
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Whether a failure after `attempt` retries should be retried again
    pub fn should_retry(&self, attempt: u32, error: &WorkflowError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }
}
