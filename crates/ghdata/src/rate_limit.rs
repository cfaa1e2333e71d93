//! Proactive request pacing for the GitHub API.
//!
//! Every outbound request acquires one token from a shared [`ApiRateLimiter`]
//! before it is sent. The limiter is a GCRA bucket from the `governor` crate
//! with a burst capacity of one, so tokens never accumulate beyond immediate
//! need and the long-run request rate stays under the platform quota.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Published GitHub quotas.
pub mod quotas {
    /// Authenticated REST/GraphQL core quota per hour.
    pub const GITHUB_REQUESTS_PER_HOUR: u32 = 5_000;
    /// Requests per hour held back from the quota (about 0.01 requests/second).
    pub const GITHUB_SAFETY_MARGIN_PER_HOUR: u32 = 36;
    /// Authenticated search API quota per minute.
    pub const GITHUB_SEARCH_PER_MINUTE: u32 = 30;
}

/// A shareable token-bucket limiter.
///
/// Clones share the same bucket, so one instance can gate any number of
/// concurrent workers.
///
/// # Example
///
/// ```ignore
/// use ghdata::rate_limit::{ApiRateLimiter, quotas};
///
/// let limiter = ApiRateLimiter::per_hour(
///     quotas::GITHUB_REQUESTS_PER_HOUR,
///     quotas::GITHUB_SAFETY_MARGIN_PER_HOUR,
/// );
///
/// // Before each API call:
/// limiter.acquire().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    period: Duration,
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("period", &self.period)
            .finish()
    }
}

impl ApiRateLimiter {
    /// Create a limiter that releases one token every `period`.
    ///
    /// A zero period is treated as one request per second.
    pub fn with_period(period: Duration) -> Self {
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
            period: if period.is_zero() {
                Duration::from_secs(1)
            } else {
                period
            },
        }
    }

    /// Create a limiter sized to an hourly quota minus a safety margin.
    ///
    /// With the GitHub defaults (5000/h, margin 36) this issues one token
    /// roughly every 728 ms.
    pub fn per_hour(requests_per_hour: u32, safety_margin: u32) -> Self {
        let effective = requests_per_hour.saturating_sub(safety_margin).max(1);
        Self::with_period(Duration::from_secs(3600) / effective)
    }

    /// Create a limiter for a per-minute quota.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::with_period(Duration::from_secs(60) / requests_per_minute.max(1))
    }

    /// Create a limiter for a per-second quota.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::with_period(Duration::from_secs(1) / requests_per_second.max(1))
    }

    /// The default limiter for the GitHub core API.
    pub fn github_default() -> Self {
        Self::per_hour(
            quotas::GITHUB_REQUESTS_PER_HOUR,
            quotas::GITHUB_SAFETY_MARGIN_PER_HOUR,
        )
    }

    /// The interval between tokens.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait until a request token is available.
    ///
    /// Waiters are served as the bucket refills; there is no fairness
    /// guarantee beyond that.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}
