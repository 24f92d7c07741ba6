//! Per-stage retry policy: bounded exponential backoff with full jitter.
//!
//! Only failures classified as transient infrastructure are retried; everything else is
//! returned on the first attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::error::ClassifiedError;
use crate::config::Config;

/// Bounded exponential backoff with full jitter, applied per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Always at least one.
    pub max_attempts: u32,
    /// Delay before the second attempt, before jitter.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Policy described by `RETRY_*` configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Backoff ceiling after `attempt` failed attempts (1-based), before jitter.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or exhausts the
    /// attempt budget. The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifiedError,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(error) if error.class().is_retryable() && attempt < max_attempts => {
                    let delay = self.jittered_delay(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if attempt > 1 {
                        tracing::warn!(operation, attempt, error = %error, "Giving up");
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::ErrorClass;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("{0:?}")]
    struct Failure(ErrorClass);

    impl ClassifiedError for Failure {
        fn class(&self) -> ErrorClass {
            self.0
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(3)
            .run("op", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Failure(ErrorClass::TransientInfrastructure))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.expect("succeeds"), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_budget_is_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(3)
            .run("op", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Failure(ErrorClass::TransientInfrastructure))
            })
            .await;
        assert_eq!(
            result.expect_err("exhausted").0,
            ErrorClass::TransientInfrastructure
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        for class in [
            ErrorClass::NotFound,
            ErrorClass::Validation,
            ErrorClass::ContractViolation,
        ] {
            let counter = AtomicU32::new(0);
            let calls = &counter;
            let result: Result<(), _> = fast(5)
                .run("op", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Failure(class))
                })
                .await;
            assert_eq!(result.expect_err("fatal").0, class);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn backoff_grows_exponentially_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_secs(8));
        assert_eq!(policy.backoff_ceiling(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_within_ceiling() {
        let policy = RetryPolicy::default();
        for attempt in 1..6 {
            assert!(policy.jittered_delay(attempt) <= policy.backoff_ceiling(attempt));
        }
    }
}
