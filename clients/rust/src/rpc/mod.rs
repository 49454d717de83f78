//! Provider call utilities.
//!
//! This module provides:
//! - `ProviderRateLimiter` - Token bucket rate limiting for provider requests
//! - `RetryExecutor` - Backoff retry logic for transient provider failures

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::{ProviderRateLimiter, RateLimitGuard};
pub use retry::{RetryExecutor, RetryExecutorBuilder};
