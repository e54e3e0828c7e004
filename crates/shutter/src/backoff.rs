//! Reconnect backoff state owned by the connection manager.

use crate::config::RelayConfig;
use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait unit; attempt n waits `n * interval`.
    pub interval: Duration,
    /// Upper bound on a single wait.
    pub cap: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Wait before retrying after the `attempt`-th consecutive failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.interval.saturating_mul(attempt).min(self.cap)
    }
}

impl From<&RelayConfig> for ReconnectPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            interval: config.reconnect_interval,
            cap: config.reconnect_cap,
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Outcome of recording a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Wait this long, then try again.
    After(Duration),
    /// `max_attempts` consecutive failures reached.
    GiveUp,
}

/// Consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Failures since the last open session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A session opened; start counting from zero again.
    pub fn record_open(&mut self) {
        self.attempts = 0;
    }

    /// A connection attempt failed or an open session ended.
    pub fn record_failure(&mut self) -> Retry {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.policy.max_attempts {
            Retry::GiveUp
        } else {
            Retry::After(self.policy.delay_for(self.attempts))
        }
    }
}
