//! Caller-owned retry.
//!
//! The connection manager never retries on its own. Callers that want to ride
//! out transient failures wrap an operation in a [`RetryPolicy`]; only errors
//! whose [`is_retryable`](crate::error::OraError::is_retryable) is true
//! (connection and timeout kinds) are retried.

use crate::config::ConnectionConfig;
use crate::error::OraResult;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Use `retry_attempts` and `retry_delay` from a connection config.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.retry_attempts(), config.retry_delay())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. Sleeps the calling thread for `delay` between
    /// attempts. The last error is returned unchanged.
    pub fn run<T, F>(&self, operation: &str, mut f: F) -> OraResult<T>
    where
        F: FnMut() -> OraResult<T>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    warn!(
                        operation = %operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "Retryable failure, retrying"
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
