//! Retry with exponential backoff and jitter, used by the feature resolver's
//! network fetches and the image manager's registry digest checks.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let jitter = fastrand_like_jitter(attempt);
        Duration::from_millis(exp.saturating_add(jitter)).min(self.max_delay)
    }
}

// A tiny deterministic jitter source, avoiding an extra dependency: spreads
// retries without requiring true randomness.
fn fastrand_like_jitter(attempt: u32) -> u64 {
    ((attempt as u64).wrapping_mul(2654435761) % 50) as u64
}

/// Runs `operation` up to `policy.max_attempts` times, retrying on `Err`
/// with exponential backoff between attempts.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, %err, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempt, %err, "retry attempts exhausted");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let result: Result<u32, &str> = retry(policy, || {
            calls.set(calls.get() + 1);
            async move {
                if calls.get() < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result: Result<u32, &str> = retry(policy, || async { Err("always fails") }).await;
        assert_eq!(result, Err("always fails"));
    }
}
