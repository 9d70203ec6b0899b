use std::time::Duration;

use anyhow::Result;

/// Shared retry policy for network calls: a fixed attempt budget with a
/// linear backoff (first sleep `base_delay`, then 2x, 3x, ...).
///
/// The old scripts each carried their own sleep-and-retry loop; every fetch
/// in this crate goes through one of these instead.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Runs `op` until it succeeds, a non-retryable error surfaces, or the
    /// attempt budget runs out. Returns the last error in the failure case.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T>,
        is_retryable: impl Fn(&anyhow::Error) -> bool,
    ) -> Result<T> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts.max(1) {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = is_retryable(&err);
                    last_err = Some(err);
                    if !retryable || attempt == self.max_attempts {
                        break;
                    }
                    std::thread::sleep(self.base_delay * attempt);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry budget exhausted")))
    }
}

/// Transient-failure predicate shared by the vendor clients: timeouts,
/// connection errors and 5xx responses get another attempt, everything else
/// surfaces immediately.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(req_err) = err.downcast_ref::<reqwest::Error>() {
        if req_err.is_timeout() || req_err.is_connect() {
            return true;
        }
        if let Some(status) = req_err.status() {
            return status.is_server_error();
        }
        return false;
    }
    // Status errors surfaced as plain messages (`http 503: ...`).
    let msg = err.to_string();
    msg.contains("http 5") || msg.contains("timed out")
}
