use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed pause before each retry
    pub delay: Duration,
}

impl RetryConfig {
    /// One retry after `delay`: the policy applied to reconciliation transactions.
    pub fn single_retry(delay: Duration) -> Self {
        Self {
            max_attempts: 2,
            delay,
        }
    }
}

/// Retry policy for determining if an error is retryable
pub trait RetryPolicy<E> {
    fn is_retryable(&self, error: &E) -> bool;
}

/// Retries infrastructure failures only; business-rule rejections pass through.
pub struct TransactionRetryPolicy;

impl RetryPolicy<ServiceError> for TransactionRetryPolicy {
    fn is_retryable(&self, error: &ServiceError) -> bool {
        error.is_retryable()
    }
}

/// Execute an async function with retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    policy: impl RetryPolicy<E>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if attempts >= config.max_attempts || !policy.is_retryable(&error) {
                    if attempts > 1 {
                        warn!("Operation failed after {} attempts: {}", attempts, error);
                    }
                    return Err(error);
                }

                metrics::counter!("fulfillment.retry.attempts", 1);
                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, error, config.delay
                );

                sleep(config.delay).await;
            }
        }
    }
}
