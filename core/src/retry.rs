//! Bounded retry for errors that AWS resolves on its own given time, such as
//! a freshly created principal not yet being visible to IAM.

use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retryable failures are retried until this much time has passed.
    /// One final attempt is made once the window closes.
    pub timeout:       Duration,
    pub initial_delay: Duration,
    pub max_delay:     Duration,
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout:       Duration::from_secs(30),
            initial_delay: Duration::from_millis(500),
            max_delay:     Duration::from_secs(10),
        }
    }
}

pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    current.saturating_mul(2).min(policy.max_delay)
}

/// Run `attempt` until it succeeds, fails with an error `is_retryable` rejects,
/// or the policy's window has elapsed.
pub async fn retry_while<T, E, F, Fut, P>(policy: &RetryPolicy, is_retryable: P, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let deadline = Instant::now() + policy.timeout;
    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt().await {
            Err(e) if is_retryable(&e) && Instant::now() < deadline => {
                let wait = delay.min(deadline.saturating_duration_since(Instant::now()));
                tracing::warn!(
                    attempt = attempts,
                    delay_ms = wait.as_millis() as u64,
                    error = %e,
                    "Retryable error, backing off",
                );
                tokio::time::sleep(wait).await;
                delay = next_delay(delay, policy);
            }
            res => return res,
        }
    }
}
