//! Keyed request budgets for outbound API calls.
//!
//! A thin wrapper over a keyed `governor` limiter: each named bucket gets the
//! same per-minute quota, and a denial surfaces as a typed rate-limit error
//! carrying a wait hint instead of blocking the caller.

use std::num::NonZeroU32;

use governor::clock::{Clock, QuantaClock};
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::error::ApiError;

type KeyedLimiter = RateLimiter<String, DashMapStateStore<String>, QuantaClock>;

/// Per-bucket request budget with a shared per-minute quota.
pub struct RequestBudget {
    limiter: KeyedLimiter,
    clock: QuantaClock,
    per_minute: u32,
}

impl RequestBudget {
    /// Build a budget admitting `max_per_minute` requests per bucket.
    ///
    /// Returns `None` for a zero quota, which callers treat as "no limiter"
    /// (every request admitted).
    pub fn per_minute(max_per_minute: u32) -> Option<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(max_per_minute)?);
        let clock = QuantaClock::default();
        let limiter = RateLimiter::new(quota, DashMapStateStore::default(), &clock);
        Some(Self {
            limiter,
            clock,
            per_minute: max_per_minute,
        })
    }

    /// Take `cost` units from `bucket`, or fail with a rate-limit error
    /// carrying the wait hint. A zero cost always succeeds.
    pub fn consume(&self, bucket: &str, cost: u32) -> Result<(), ApiError> {
        let Some(cost) = NonZeroU32::new(cost) else {
            return Ok(());
        };

        match self.limiter.check_key_n(&bucket.to_string(), cost) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(not_until)) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let retry_after_ms = (wait.as_millis() as u64).max(1);
                debug!(bucket, retry_after_ms, "Request budget exhausted");
                Err(ApiError::rate_limited(retry_after_ms))
            }
            // Cost exceeds the bucket capacity outright; a full window cannot
            // satisfy it, so report the whole window as the wait.
            Err(_) => Err(ApiError::rate_limited(60_000)),
        }
    }

    /// The configured per-minute quota.
    pub fn quota_per_minute(&self) -> u32 {
        self.per_minute
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("per_minute", &self.per_minute)
            .finish()
    }
}
