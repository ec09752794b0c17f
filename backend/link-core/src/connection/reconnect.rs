//! Bounded exponential backoff between connection attempts.

use crate::config::ConnectionConfig;
use crate::error::connection::ConnectionError;

use models::RetryBudget;

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    ceiling: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, ceiling: u32) -> Self {
        Self { base, cap, ceiling }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(
            config.reconnect_base,
            config.reconnect_cap,
            config.max_connection_attempts,
        )
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// `min(base * 2^(attempt - 1), cap)`, rounded to whole milliseconds.
    ///
    /// Attempt numbers start at 1; 0 is treated as 1.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let mut backoff = ExponentialBackoff {
            current_interval: self.base,
            initial_interval: self.base,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.cap,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let mut delay = self.base;
        for _ in 0..attempt.max(1) {
            delay = backoff.next_backoff().unwrap_or(self.cap);
            if delay >= self.cap {
                break;
            }
        }

        round_to_millis(delay.min(self.cap))
    }

    /// Fails once the connection ceiling has been used up.
    #[track_caller]
    pub fn check_ceiling(&self, budget: &RetryBudget) -> Result<(), ConnectionError> {
        if budget.connection_exhausted(self.ceiling) {
            return Err(ConnectionError::ceiling_exceeded(
                budget.connection_attempts,
                self.ceiling,
            ));
        }
        Ok(())
    }

    /// Delay before the next attempt, or `CeilingExceeded` when there is no
    /// next attempt.
    #[track_caller]
    pub fn schedule(&self, budget: &RetryBudget) -> Result<Duration, ConnectionError> {
        self.check_ceiling(budget)?;
        Ok(self.next_delay(budget.connection_attempts.saturating_add(1)))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

// The backoff crate jitters by up to a nanosecond even with no randomization.
fn round_to_millis(delay: Duration) -> Duration {
    let millis = (delay.as_secs_f64() * 1000.0).round();
    Duration::from_millis(millis as u64)
}
