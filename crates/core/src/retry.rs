//! Bounded exponential backoff shared by provider and store clients

use crate::error::{BackendError, PersistenceError};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Errors that may succeed when the same call is repeated.
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Server-suggested wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for BackendError {
    fn is_transient(&self) -> bool {
        BackendError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            BackendError::RateLimitError {
                retry_after: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl Transient for PersistenceError {
    fn is_transient(&self) -> bool {
        matches!(self, PersistenceError::PersistenceUnavailable(_))
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// `attempt` is 1-based; the first retry waits `initial_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let backoff = self.initial_backoff.saturating_mul(1u32 << shift);
        backoff.min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = err
                        .retry_after()
                        .map(|d| d.min(self.max_backoff))
                        .unwrap_or_else(|| self.backoff_for_attempt(attempt));
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(5)
            .with_backoff(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_store_outage_retried_then_surfaced() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), PersistenceError> = fast(2)
            .run("write", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PersistenceError::PersistenceUnavailable("refused".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejected_statement_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), PersistenceError> = fast(3)
            .run("write", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PersistenceError::Rejected("syntax".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = BackendError::RateLimitError {
            retry_after: Some(2),
        };
        assert_eq!(Transient::retry_after(&err), Some(Duration::from_secs(2)));
    }
}
