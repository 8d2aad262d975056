//! Bounded exponential backoff for transient failures
//!
//! Only errors whose `is_retryable()` is true are retried. A pending retry
//! is abandoned as soon as shutdown is requested.

use crate::config::RetryConfig;
use crate::core::pipeline::ShutdownSignal;
use crate::domain::Result;
use crate::log_retry_attempt;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Upper bound of the random jitter added to each delay, as a fraction
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based), without jitter
    pub fn backoff_delay(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as usize) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jittered(delay: Duration) -> Duration {
        let fraction = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
        delay + delay.mul_f64(fraction)
    }

    /// Runs `op` until it succeeds, fails permanently or attempts run out
    ///
    /// The last error is returned unchanged.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        shutdown: &ShutdownSignal,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt <= self.max_retries => {
                    if shutdown.is_requested() {
                        return Err(e);
                    }

                    let delay = Self::jittered(self.backoff_delay(attempt));
                    attempt += 1;
                    log_retry_attempt!(operation, attempt, self.max_attempts(), delay, e);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.requested() => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackfillError, ExtractionError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        )
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(30000));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let delay = RetryPolicy::jittered(base);
            assert!(delay >= base);
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_error_until_success() {
        let calls = &AtomicUsize::new(0);
        let result = fast_policy(3)
            .run("fetch", &ShutdownSignal::never(), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BackfillError::Connection("reset".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = fast_policy(2)
            .run("fetch", &ShutdownSignal::never(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ExtractionError::Fetch("503 Slow Down".to_string()).into())
            })
            .await;

        assert!(matches!(
            result,
            Err(BackfillError::Extraction(ExtractionError::Fetch(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = &AtomicUsize::new(0);
        let result: Result<()> = fast_policy(5)
            .run("fetch", &ShutdownSignal::never(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ExtractionError::ObjectNotFound("k".to_string()).into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_retrying() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let shutdown = ShutdownSignal::new(rx);

        let calls = &AtomicUsize::new(0);
        let result: Result<()> = fast_policy(5)
            .run("merge", &shutdown, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackfillError::Connection("terminating connection".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
