//! Bounded retry with linear backoff.
//!
//! One helper, parameterized by an is-retryable predicate, replaces scattered
//! ad hoc retry loops. It is applied only to the critical bootstrap reads
//! that need it; authorization and not-found failures are terminal and must
//! never be routed through here.

use std::future::Future;
use std::time::Duration;

/// Retry policy: a small fixed attempt count with linear backoff.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub attempts: u32,
    /// Backoff unit; attempt `n` waits `n * base_delay` before retrying.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Run `op`, retrying on failures that `is_retryable` classifies as
/// transient. Non-retryable failures and the final attempt's failure are
/// returned as-is.
pub async fn retry_transient<T, E, F, Fut, P>(
    policy: RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && is_retryable(&err) => {
                let delay = policy.base_delay * attempt;
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
