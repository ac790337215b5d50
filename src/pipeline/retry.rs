//! Exponential backoff for transient stage failures.

use crate::config::RetrySettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy applied to every external stage call.
///
/// Transient errors (rate limiting, timeouts, service trouble, partial
/// downloads) are retried in place; everything else surfaces on the
/// first failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt,
    /// capped.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor as u32);
        delay.min(self.max_delay)
    }

    /// Run `op`, retrying transient failures with backoff up to the
    /// configured attempt cap.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        what,
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkribentError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(&RetrySettings {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 4,
        })
    }

    #[test]
    fn test_delay_growth_is_capped() {
        let policy = RetryPolicy::new(&RetrySettings {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        });
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(30), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(4)
            .run("test op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SkribentError::RateLimited("slow down".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_cap_is_honored() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(3)
            .run("test op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SkribentError::Timeout("still down".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SkribentError::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(5)
            .run("test op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(SkribentError::VideoNotFound("gone".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SkribentError::VideoNotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
