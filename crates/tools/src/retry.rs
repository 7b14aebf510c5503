//! Exponential-backoff retry for idempotent GETs.
//!
//! Only transient failures retry: timeouts, connection errors, and 5xx.
//! 4xx is permanent, cancellation is final, and mutating calls never pass
//! through here at all.

use std::future::Future;
use std::time::Duration;

use wf_domain::{Error, Result};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self.initial_delay.as_millis() as u64 * 2u64.saturating_pow(attempt - 1);
        Duration::from_millis(ms).min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, backing off between transient
    /// failures. The final error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying transient failure");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Transient = worth a retry on an idempotent GET.
fn is_transient(e: &Error) -> bool {
    match e {
        Error::Timeout(_) | Error::Http(_) => true,
        Error::HttpStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_5xx_then_succeeds() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<u32> = policy
            .run(|| async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::HttpStatus {
                        status: 503,
                        message: "unavailable".into(),
                    })
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_4xx() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<u32> = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::HttpStatus {
                    status: 403,
                    message: "blocked".into(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_cancellation() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<u32> = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::Cancelled("turn over".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::default();
        let attempts = AtomicU32::new(0);
        let result: Result<u32> = policy
            .run(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::Timeout("slow".into()))
            })
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(10), Duration::from_millis(2_000));
    }
}
