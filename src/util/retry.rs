//! Retry logic with exponential backoff for transient repository failures

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

use crate::error::IsRetryable;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// additional attempts after the first one
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// initial_delay, doubling with every retry, capped at max_delay. Millisecond resolution.
    pub fn delays(&self) -> ExponentialBackoff {
        let initial_millis = (self.initial_delay.as_millis() as u64).max(1);
        // NB: yields base^n * factor, i.e. 2 * factor, 4 * factor, ...
        ExponentialBackoff::from_millis(2)
            .factor(initial_millis.div_ceil(2))
            .max_delay(self.max_delay.max(Duration::from_millis(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Executes `operation` until it succeeds, fails with a non-retryable error, or the retries are
///  exhausted; the last error is returned. `on_attempt` is told the 1-based number of every attempt
///  before it starts.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut on_attempt: impl FnMut(u32),
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delays = policy.delays();
    let mut attempt = 0;

    loop {
        attempt += 1;
        on_attempt(attempt);

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt <= policy.retries => {
                let delay = delays.next()
                    .unwrap_or(policy.max_delay)
                    .min(policy.max_delay);
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::debug!(error = %e, attempts = attempt, "retries exhausted");
                }
                return Err(e);
            }
        }
    }
}
