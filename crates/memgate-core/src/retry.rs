//! Bounded retry with exponential backoff
//!
//! Every external call the engine makes goes through [`RetryPolicy::run`]:
//! - Each attempt is wrapped in a per-call timeout
//! - Only errors that classify themselves as retryable are retried
//! - Attempts are capped, so a dead collaborator never hangs a sweep

use crate::config::RetryConfig;
use crate::error::{GatewayError, RoleApiError, StoreError};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Error classification used by the retry loop
pub trait Retryable: Display {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Platform-suggested wait before the next attempt
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Error to report when an attempt exceeds its timeout
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for GatewayError {
    fn is_retryable(&self) -> bool {
        GatewayError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        Self::Timeout(after)
    }
}

impl Retryable for RoleApiError {
    fn is_retryable(&self) -> bool {
        RoleApiError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    fn timed_out(after: Duration) -> Self {
        Self::Timeout(after)
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }

    fn timed_out(after: Duration) -> Self {
        Self::Timeout(after)
    }
}

/// Last error after the retry loop gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Error from the final attempt
    pub error: E,
    /// Attempts made
    pub attempts: u32,
}

/// Retry policy for external calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    call_timeout: Duration,
}

impl RetryPolicy {
    /// Build from configuration
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            call_timeout: config.call_timeout(),
        }
    }

    /// Policy with no delay between attempts
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            call_timeout: Duration::from_secs(30),
        }
    }

    /// With a different per-call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Attempts per call, including the first
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failure (1-based)
    ///
    /// Doubles from the base delay, plus up to 25% jitter, capped at the
    /// maximum delay.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);

        let jitter_ms = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        };

        (delay + jitter).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// # Errors
    /// Returns the last error with the number of attempts made
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RetryFailure<E>>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.call_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = error
                        .retry_after()
                        .unwrap_or_else(|| self.backoff(attempt))
                        .min(self.max_delay.max(self.base_delay));
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(&RetryConfig {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            call_timeout_ms: 1_000,
        });
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
        assert_eq!(policy.backoff(30), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RoleApiError::Transient("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryFailure<RoleApiError>> = RetryPolicy::immediate(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoleApiError::Permanent("403".into()))
            })
            .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_capped() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryFailure<StoreError>> = RetryPolicy::immediate(4)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::transient("busy"))
            })
            .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.error, StoreError::transient("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let policy = RetryPolicy::immediate(2).with_call_timeout(Duration::from_millis(50));
        let result: Result<(), RetryFailure<RoleApiError>> = policy
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.error, RoleApiError::Timeout(Duration::from_millis(50)));
    }
}
