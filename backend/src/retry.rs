use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::error::StoreError;

/// Backoff applied to SQLite lock contention. `max_retries` counts retries,
/// so an operation runs at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }

    /// Runs `op`, retrying only while it fails with lock contention.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        op.retry(self.backoff())
            .when(StoreError::is_contention)
            .notify(|err: &StoreError, delay: Duration| {
                warn!(operation, ?delay, "Vote store locked, retrying: {}", err);
            })
            .await
            .map_err(|err| match err {
                StoreError::Database(source) if crate::error::is_sqlite_lock_error(&source) => {
                    StoreError::Contention { attempts: self.max_retries + 1, source }
                }
                other => other,
            })
    }
}
