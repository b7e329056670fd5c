//! Capped exponential backoff for external calls.

use std::future::Future;
use std::time::Duration;

/// Retry policy shared by HTTP clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Maximum number of attempts, first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Calculate delay for a given attempt number, starting at 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Run `operation` until it succeeds or attempts are exhausted, returning
    /// the last error.
    pub async fn retry<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempts = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempts += 1;
                    if !self.should_retry(attempts) {
                        tracing::error!(
                            operation = name,
                            attempts,
                            error = %err,
                            "giving up after retries"
                        );
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempts - 1);
                    tracing::warn!(
                        operation = name,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast() -> Backoff {
        Backoff {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(backoff.delay_for_attempt(9), Duration::from_secs(30));
        assert!(backoff.should_retry(9));
        assert!(!backoff.should_retry(10));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<u32, String> = fast()
            .retry("flaky", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("failure {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), &str> = fast()
            .retry("down", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("unreachable")
            })
            .await;

        assert_eq!(result, Err("unreachable"));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
