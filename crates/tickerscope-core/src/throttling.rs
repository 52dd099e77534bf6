use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::trace;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared request budget for one upstream provider.
///
/// Workers await [`RequestPacer::until_ready`] before each outgoing request, so a
/// wide worker pool cannot exceed the provider quota.
pub struct RequestPacer {
    limiter: DirectRateLimiter,
    requests_per_minute: u32,
}

impl RequestPacer {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            limiter: RateLimiter::direct(quota_from_window(
                Duration::from_secs(60),
                requests_per_minute,
            )),
            requests_per_minute: requests_per_minute.max(1),
        }
    }

    pub async fn until_ready(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        trace!(
            requests_per_minute = self.requests_per_minute,
            "request budget exhausted, waiting"
        );
        self.limiter.until_ready().await;
    }

    /// Non-blocking probe; consumes a cell when budget is available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub const fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish_non_exhaustive()
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let safe_limit = NonZeroU32::new(limit.max(1)).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (window.as_secs_f64() / f64::from(safe_limit.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(safe_limit))
        .allow_burst(safe_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_bounded_by_quota() {
        let pacer = RequestPacer::per_minute(3);

        assert!(pacer.try_acquire());
        assert!(pacer.try_acquire());
        assert!(pacer.try_acquire());
        assert!(!pacer.try_acquire());
    }

    #[test]
    fn zero_quota_is_clamped_to_one() {
        let pacer = RequestPacer::per_minute(0);
        assert_eq!(pacer.requests_per_minute(), 1);
        assert!(pacer.try_acquire());
    }

    #[tokio::test]
    async fn until_ready_returns_immediately_with_budget() {
        let pacer = RequestPacer::per_minute(600);
        pacer.until_ready().await;
        assert!(pacer.try_acquire());
    }
}
