use innkeep_core::{StoreError, StoreResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff for idempotent reads. Writes never go
/// through this.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// One failed attempt, tagged with whether trying again could help.
#[derive(Debug)]
pub struct AttemptFailure {
    pub error: StoreError,
    pub retryable: bool,
}

impl AttemptFailure {
    pub fn retryable(error: StoreError) -> Self {
        Self { error, retryable: true }
    }

    pub fn fatal(error: StoreError) -> Self {
        Self { error, retryable: false }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        "{} failed ({}) - retry {}/{} after {:?}",
                        operation,
                        failure.error,
                        attempt,
                        self.max_attempts - 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }
}
