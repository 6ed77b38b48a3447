use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::time::Instant;

use crate::provider_policy::ProviderPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Gates outgoing calls on two rules: a quota of calls per window, and a
/// fixed pause after each successful call.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
    pacing_interval: Duration,
    next_start: Arc<Mutex<Option<Instant>>>,
}

impl RequestPacer {
    pub fn new(quota_window: Duration, quota_limit: u32, pacing_interval: Duration) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
            pacing_interval,
            next_start: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(
            policy.quota_window,
            policy.quota_limit,
            policy.pacing_interval,
        )
    }

    /// Wait until another attempt may start.
    pub async fn ready(&self) {
        let pending = *self.next_start.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(deadline) = pending {
            if deadline > Instant::now() {
                tracing::debug!(
                    wait_ms = (deadline - Instant::now()).as_millis() as u64,
                    "pacing before next request"
                );
                tokio::time::sleep_until(deadline).await;
            }
        }

        self.limiter.until_ready().await;
    }

    /// Record a successful call; the next one waits out the pacing interval.
    pub fn mark_success(&self) {
        if self.pacing_interval.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.pacing_interval;
        *self.next_start.lock().unwrap_or_else(PoisonError::into_inner) = Some(deadline);
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
