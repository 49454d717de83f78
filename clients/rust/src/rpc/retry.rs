//! Retry logic with backoff.
//!
//! Provides automatic retry for transient provider failures. The scanner
//! runs with an unbounded fixed-delay policy and retries every provider
//! error; bounded exponential backoff with jitter is available for
//! one-shot callers.

use crate::config::RetryConfig;
use crate::errors::MigrationError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Executor that handles retries with backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create a retry executor with default configuration.
    pub fn default_executor() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Create a retry executor that doesn't retry.
    pub fn no_retry() -> Self {
        Self::new(RetryConfig {
            max_retries: Some(0),
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        })
    }

    /// Execute an operation with retry logic.
    ///
    /// The operation is retried while it fails with a retryable error and
    /// the retry budget (if any) is not exhausted. Non-retryable errors are
    /// returned immediately.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, MigrationError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MigrationError>>,
    {
        self.execute_if(MigrationError::is_retryable, operation).await
    }

    /// Like [`execute`](Self::execute), retrying whichever errors `should_retry` accepts.
    pub async fn execute_if<P, F, Fut, T>(&self, should_retry: P, operation: F) -> Result<T, MigrationError>
    where
        P: Fn(&MigrationError) -> bool,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MigrationError>>,
    {
        let mut attempts: u32 = 0;
        let mut delay = self.config.initial_delay_ms;

        loop {
            attempts = attempts.saturating_add(1);

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let exhausted = self
                        .config
                        .max_retries
                        .is_some_and(|max| attempts > max);
                    if !should_retry(&e) || exhausted {
                        return Err(e);
                    }

                    let mut wait_time = delay;
                    if let Some(hint) = e.retry_hint_ms() {
                        wait_time = wait_time.max(hint);
                    }
                    if self.config.jitter {
                        wait_time = wait_time.saturating_add(self.jitter(wait_time));
                    }

                    tracing::warn!(
                        attempts = attempts,
                        delay_ms = wait_time,
                        category = %e.category(),
                        error = %e,
                        "Provider call failed, retrying"
                    );

                    sleep(Duration::from_millis(wait_time)).await;

                    delay = ((delay as f64) * self.config.backoff_multiplier) as u64;
                    delay = delay.min(self.config.max_delay_ms);
                }
            }
        }
    }

    /// Calculate jitter for the given delay.
    fn jitter(&self, delay: u64) -> u64 {
        // Jitter is 0-25% of delay
        let max_jitter = delay / 4;
        if max_jitter == 0 {
            0
        } else {
            rand::random::<u64>() % max_jitter
        }
    }

    /// Get the maximum number of retries, `None` when unbounded.
    pub fn max_retries(&self) -> Option<u32> {
        self.config.max_retries
    }
}

/// Builder for creating retry executors with custom logic.
pub struct RetryExecutorBuilder {
    config: RetryConfig,
}

impl RetryExecutorBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    /// Bound the number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = Some(retries);
        self
    }

    /// Retry until the operation succeeds or fails permanently.
    pub fn unbounded(mut self) -> Self {
        self.config.max_retries = None;
        self
    }

    /// Set the initial delay in milliseconds.
    pub fn initial_delay_ms(mut self, delay: u64) -> Self {
        self.config.initial_delay_ms = delay;
        self
    }

    /// Set the maximum delay in milliseconds.
    pub fn max_delay_ms(mut self, delay: u64) -> Self {
        self.config.max_delay_ms = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = enabled;
        self
    }

    /// Build the retry executor.
    pub fn build(self) -> RetryExecutor {
        RetryExecutor::new(self.config)
    }
}

impl Default for RetryExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
