//! Bounded exponential-backoff retry for remote calls.
//!
//! Every stage that talks to the chain wraps its calls with [`retry`].
//! There is no jitter and no classification of retryable vs. fatal errors:
//! any error counts as retryable and the last one propagates unchanged.
//! Callers must be aware that logically non-retryable failures (e.g.
//! malformed call arguments) burn the full retry budget too.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry budget and initial delay for one wrapped call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Attempt `op` up to `policy.attempts` times with doubling delay.
///
/// On exhaustion the last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(_) if attempt < policy.attempts => {
                tracing::debug!(attempt, "retrying after transient failure");
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
