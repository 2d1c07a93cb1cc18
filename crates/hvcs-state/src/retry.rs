use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Backoff schedule for transient SQLite contention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying busy/locked failures with jittered exponential
    /// backoff. Other errors return immediately.
    pub fn run<T>(&self, operation: &str, mut op: impl FnMut() -> StateResult<T>) -> StateResult<T> {
        let mut backoff_ms = self.initial_backoff.as_millis() as u64;
        let max_ms = self.max_backoff.as_millis() as u64;
        let mut attempt = 0u32;
        loop {
            match op() {
                Err(e) if e.is_transient() => {
                    if attempt >= self.max_retries {
                        return Err(StateError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: e.to_string(),
                        });
                    }
                    let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
                    let sleep_ms = backoff_ms + jitter;
                    debug!(operation, attempt, backoff_ms = sleep_ms, "database busy, backing off");
                    thread::sleep(Duration::from_millis(sleep_ms));
                    backoff_ms = (backoff_ms * 2).min(max_ms);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
