use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::TransformError;
use crate::domain::models::config::RetryConfig;

/// An operation that still failed after the policy gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    /// Attempts actually made, first one included
    pub attempts: u32,
    pub error: TransformError,
}

/// Exponential backoff for establishing a transform stream.
///
/// Only the establishment phase is retried: once chunks have started to flow
/// a failure is surfaced immediately, since replaying the request could apply
/// text twice. Backoff doubles per retry: 500ms → 1s → 2s ... capped at
/// `max_backoff_ms`.
///
/// # Retry Decision
/// - Retry on: rate limiting, 5xx, network errors, timeouts
/// - Do NOT retry: invalid request, auth failures, not found, cancellation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    max_attempts: u32,
    /// Delay before the first retry in milliseconds
    initial_backoff_ms: u64,
    /// Maximum delay in milliseconds
    max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Example
    /// ```
    /// use composer::infrastructure::transform::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(3, 500, 8_000);
    /// assert_eq!(policy.max_attempts(), 3);
    /// ```
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms,
            max_backoff_ms: max_backoff_ms.max(initial_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the failed attempt number `attempt` (1-based).
    ///
    /// Formula: min(initial_backoff * 2^(attempt - 1), max_backoff)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(exponent))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    /// Run `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// Cancellation interrupts both a running attempt and a backoff sleep and
    /// is reported as [`TransformError::Cancelled`].
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransformError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(TransformError::Cancelled),
                result = operation() => result,
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.should_retry(&err, attempt) {
                if err.is_transient() {
                    warn!(attempts = attempt, error = %err, "Giving up after exhausting retries");
                } else {
                    debug!(error = %err, "Permanent error, not retrying");
                }
                return Err(RetryFailure {
                    attempts: attempt,
                    error: err,
                });
            }

            let backoff = self.backoff_after(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                ?backoff,
                "Attempt failed with transient error, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error: TransformError::Cancelled,
                    });
                }
                () = sleep(backoff) => {}
            }
        }
    }

    fn should_retry(&self, err: &TransformError, attempt: u32) -> bool {
        err.is_transient() && attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn server_error() -> TransformError {
        TransformError::Server {
            status: 503,
            body: "overloaded".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100, 500);
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_after(4), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, 10, 20).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let policy = RetryPolicy::new(3, 100, 1_000);
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();

        let result = policy
            .execute(&CancellationToken::new(), || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(3, 10, 100);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = policy
            .execute(&CancellationToken::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransformError::Timeout)
            })
            .await;

        assert_eq!(
            result,
            Err(RetryFailure {
                attempts: 3,
                error: TransformError::Timeout
            })
        );
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let policy = RetryPolicy::new(3, 10, 100);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = policy
            .execute(&CancellationToken::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransformError::Unauthorized)
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let policy = RetryPolicy::new(3, 10_000, 60_000);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = policy
            .execute(&cancel, || async { Err(server_error()) })
            .await;

        assert_eq!(
            result,
            Err(RetryFailure {
                attempts: 1,
                error: TransformError::Cancelled
            })
        );
    }
}
