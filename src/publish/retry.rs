//! Bounded retry with exponential backoff for release API calls.

use super::PublishError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failure
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = u64::from(self.factor.max(1)).saturating_pow(exponent);
        let delay = self.initial_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors for which [`PublishError::is_retryable`] holds are retried. The
/// last error is returned once the budget is spent.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PublishError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            factor: 2,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn stops_on_permanent_error() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            ..Default::default()
        };
        let result: Result<(), _> = with_retry(&policy, "create release", || {
            calls.set(calls.get() + 1);
            async {
                Err(PublishError::TagInUse {
                    tag: "abc1234".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(PublishError::TagInUse { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_budget() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            ..Default::default()
        };
        let result: Result<(), _> = with_retry(&policy, "upload asset", || {
            calls.set(calls.get() + 1);
            async {
                Err(PublishError::Rejected {
                    operation: "upload asset",
                    status: 502,
                    body: String::new(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(PublishError::Rejected { status: 502, .. })));
        assert_eq!(calls.get(), 3);
    }
}
