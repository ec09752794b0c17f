use serde::{Deserialize, Serialize};

/// The two independent retry counters.
///
/// `connection_attempts` counts socket opens since the last successful
/// open. `restart_attempts` counts in-process restarts and only goes back to
/// zero with a fresh process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryBudget {
    pub connection_attempts: u32,
    pub restart_attempts: u32,
}

impl RetryBudget {
    pub fn begin_connection_attempt(&mut self) -> u32 {
        self.connection_attempts = self.connection_attempts.saturating_add(1);
        self.connection_attempts
    }

    pub fn reset_connection_attempts(&mut self) {
        self.connection_attempts = 0;
    }

    pub fn record_restart(&mut self) -> u32 {
        self.restart_attempts = self.restart_attempts.saturating_add(1);
        self.restart_attempts
    }

    pub fn connection_exhausted(&self, ceiling: u32) -> bool {
        self.connection_attempts >= ceiling
    }

    pub fn restarts_exhausted(&self, ceiling: u32) -> bool {
        self.restart_attempts > ceiling
    }
}
