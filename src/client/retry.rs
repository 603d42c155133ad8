//! Exponential-backoff retry for transient API failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{ApiError, ErrorKind};

/// Ceiling on any single backoff delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retry policy with exponential backoff and optional jitter.
///
/// `max_retries` bounds the total number of invocations: an operation that
/// keeps failing with a retryable error runs exactly `max_retries` times
/// before the last error propagates. Non-retryable errors propagate after the
/// first invocation with no delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    jitter: bool,
    retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000), true)
    }
}

impl RetryPolicy {
    /// Build a policy retrying rate-limit errors only.
    pub fn new(max_retries: u32, base_delay: Duration, jitter: bool) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter,
            retryable: vec![ErrorKind::RateLimit],
        }
    }

    /// Replace the set of error kinds this policy retries.
    #[must_use]
    pub fn with_retryable(mut self, kinds: &[ErrorKind]) -> Self {
        self.retryable = kinds.to_vec();
        self
    }

    /// Whether an error's kind is in the retryable set.
    pub fn should_retry(&self, err: &ApiError) -> bool {
        self.retryable.contains(&err.kind())
    }

    /// Run `op`, retrying per the policy; the operation always runs at least
    /// once.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.should_retry(&err) || attempt + 1 >= self.max_retries {
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff before the next attempt. A rate-limit `retry_after` hint takes
    /// precedence over the computed delay; jitter applies only to the latter.
    fn delay_for(&self, attempt: u32, err: &ApiError) -> Duration {
        if let Some(hint) = err.retry_after() {
            return hint.min(MAX_RETRY_DELAY);
        }

        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let delay = if self.jitter {
            let factor: f64 = rand::thread_rng().gen_range(1.0..2.0);
            exponential.mul_f64(factor)
        } else {
            exponential
        };
        delay.min(MAX_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), false)
    }

    // The rate-limit hint overrides the computed backoff, so a 1ms hint keeps
    // these tests fast.
    fn throttle() -> ApiError {
        ApiError::rate_limited(1)
    }

    #[tokio::test]
    async fn retryable_error_invokes_exactly_max_retries_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(throttle())
                }
            })
            .await;

        assert!(matches!(result, Err(ApiError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_invokes_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::authentication("bad key"))
                }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Authentication { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_once_a_transient_failure_clears() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(throttle())
                    } else {
                        Ok(7u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn expanded_retryable_set_covers_timeouts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = fast_policy(2).with_retryable(&[ErrorKind::RateLimit, ErrorKind::Timeout]);

        let result = policy
            .run(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::Timeout {
                        message: "deadline".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delay_doubles_per_attempt_without_jitter() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), false);
        let err = ApiError::Timeout {
            message: "t".to_string(),
        };

        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, &err), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, &err), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::new(64, Duration::from_secs(10), false);
        let err = ApiError::Timeout {
            message: "t".to_string(),
        };

        assert_eq!(policy.delay_for(20, &err), MAX_RETRY_DELAY);
    }

    #[test]
    fn retry_after_hint_overrides_computed_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10), true);
        let err = ApiError::rate_limited(250);

        assert_eq!(policy.delay_for(3, &err), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_one_to_two_times_base() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), true);
        let err = ApiError::Timeout {
            message: "t".to_string(),
        };

        for _ in 0..50 {
            let delay = policy.delay_for(0, &err);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay < Duration::from_millis(200));
        }
    }
}
