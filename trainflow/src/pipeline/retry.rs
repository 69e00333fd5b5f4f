//! Fixed-delay retry policy applied by the runner to every stage.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how patiently a failed stage is retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one, in seconds.
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_seconds() -> f64 {
    300.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_seconds: default_delay_seconds(),
        }
    }
}

/// What the runner does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then run the same stage again.
    Retry(Duration),
    /// No attempts left; fail the run.
    GiveUp,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_seconds: delay.as_secs_f64(),
        }
    }

    /// Policy that retries immediately.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Sets the number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_seconds = delay.as_secs_f64();
        self
    }

    /// The delay as a duration; invalid values collapse to zero.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_seconds).unwrap_or(Duration::ZERO)
    }

    /// Decides what follows the failure of attempt number `attempts_made`.
    #[must_use]
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made < self.max_attempts {
            RetryDecision::Retry(self.delay())
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Checks the policy values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for zero attempts or a negative or
    /// non-finite delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        if !(self.delay_seconds.is_finite() && self.delay_seconds >= 0.0) {
            return Err(ConfigError::invalid(
                "retry.delay_seconds",
                format!("must be a non-negative number, got {}", self.delay_seconds),
            ));
        }
        Ok(())
    }
}
