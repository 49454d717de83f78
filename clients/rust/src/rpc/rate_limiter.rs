//! Token bucket rate limiter for provider requests.
//!
//! Provides fair rate limiting with optional queuing so the chain-data and
//! minting APIs are not hammered past their published limits.

use crate::config::RateLimitConfig;
use crate::errors::MigrationError;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A token bucket rate limiter for provider requests.
///
/// Uses the `governor` crate for the token bucket. Supports both immediate
/// rejection and queuing when rate limited.
pub struct ProviderRateLimiter {
    limiter: governor::DefaultDirectRateLimiter,
    config: RateLimitConfig,
    /// Requests currently waiting for a slot
    queue_size: AtomicUsize,
}

/// Guard returned when a rate limit slot is acquired.
pub struct RateLimitGuard {
    _private: (),
}

impl ProviderRateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        let quota = governor::Quota::per_second(
            NonZeroU32::new(config.max_rps).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: governor::RateLimiter::direct(quota),
            config,
            queue_size: AtomicUsize::new(0),
        }
    }

    /// Create a rate limiter that allows unlimited requests (for testing).
    pub fn unlimited() -> Self {
        Self::new(RateLimitConfig {
            max_rps: u32::MAX,
            burst_size: u32::MAX,
            queue_on_limit: false,
            max_queue_depth: 0,
        })
    }

    /// Acquire a rate limit slot.
    ///
    /// Waits for the next available slot. When `queue_on_limit` is set and
    /// `max_queue_depth` callers are already waiting, fails with
    /// `RateLimited` instead.
    pub async fn acquire(&self) -> Result<RateLimitGuard, MigrationError> {
        if self.limiter.check().is_ok() {
            return Ok(RateLimitGuard { _private: () });
        }

        let waiting = self.queue_size.fetch_add(1, Ordering::SeqCst);
        if self.config.queue_on_limit && waiting >= self.config.max_queue_depth {
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
            return Err(MigrationError::RateLimited {
                retry_after_ms: self.estimated_wait_ms(),
            });
        }

        self.limiter.until_ready().await;
        self.queue_size.fetch_sub(1, Ordering::SeqCst);

        Ok(RateLimitGuard { _private: () })
    }

    /// Try to acquire a rate limit slot without waiting.
    ///
    /// Returns None if rate limited.
    pub fn try_acquire(&self) -> Option<RateLimitGuard> {
        self.limiter
            .check()
            .ok()
            .map(|_| RateLimitGuard { _private: () })
    }

    /// Estimate wait time in milliseconds based on current rate.
    fn estimated_wait_ms(&self) -> u64 {
        1000 / u64::from(self.config.max_rps.max(1))
    }

    /// Get the current queue depth.
    pub fn queue_depth(&self) -> usize {
        self.queue_size.load(Ordering::SeqCst)
    }
}
