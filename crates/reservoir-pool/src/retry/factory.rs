//! Factory wrapper that retries failed creations

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use reservoir_core::{RawConnection, ReservoirError, Result};

use super::BackoffStrategy;
use crate::factory::ConnectionFactory;

/// How often and how patiently to retry
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first failure (0 = no retry)
    max_attempts: u32,
    backoff: BackoffStrategy,
    /// Also retry errors that are not connection-level
    retry_all_errors: bool,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
            retry_all_errors: false,
        }
    }

    /// Retry every error, not only connection, I/O and timeout errors
    pub fn with_retry_all_errors(mut self, retry: bool) -> Self {
        self.retry_all_errors = retry;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    pub fn retry_all_errors(&self) -> bool {
        self.retry_all_errors
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, BackoffStrategy::default())
    }
}

/// A [`ConnectionFactory`] that retries `create` with backoff
pub struct RetryingFactory<F> {
    inner: F,
    config: RetryConfig,
    /// Failed attempts since the last success
    consecutive_failures: AtomicU32,
}

impl<F: ConnectionFactory> RetryingFactory<F> {
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    fn should_retry(&self, error: &ReservoirError) -> bool {
        match error {
            ReservoirError::Connection(_) | ReservoirError::Io(_) | ReservoirError::Timeout(_) => {
                true
            }
            err if err.is_misuse() => false,
            _ => self.config.retry_all_errors,
        }
    }
}

#[async_trait]
impl<F: ConnectionFactory> ConnectionFactory for RetryingFactory<F> {
    async fn create(&self) -> Result<Box<dyn RawConnection>> {
        let mut attempt = 0;
        loop {
            match self.inner.create().await {
                Ok(conn) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    return Ok(conn);
                }
                Err(err) => {
                    self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
                    if attempt >= self.config.max_attempts || !self.should_retry(&err) {
                        return Err(err);
                    }

                    let delay = self.config.backoff.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        ?delay,
                        error = %err,
                        "connection creation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn validate(&self, conn: &mut dyn RawConnection) -> bool {
        self.inner.validate(conn).await
    }
}
