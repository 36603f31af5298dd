//! Timeout + exponential backoff for remote calls

use crate::error::{EngineError, EngineResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call timeout and retry schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff: f64,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff: 1.5,
            timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay slept after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        self.initial_delay.mul_f64(self.backoff.max(1.0).powi(exponent))
    }
}

/// Run `op` under `policy`, retrying timeouts and upstream failures.
///
/// Each attempt is bounded by `policy.timeout`; an elapsed attempt becomes
/// `EngineError::Timeout`. Non-retryable errors return immediately. After the
/// last attempt the final error is returned unchanged.
pub async fn with_retry<T, F, Fut>(source: &str, policy: &RetryPolicy, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(r) => r,
            Err(_) => Err(EngineError::Timeout {
                provider: source.to_string(),
                after_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(source, attempt, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    source,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(source, attempt, error = %e, "Remote call failed");
                return Err(e);
            }
        }
    }
}
