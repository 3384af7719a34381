//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Runtime helpers supporting the update cycle."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Fixed-period ticker. The first tick fires one full period after creation,
/// and a late tick pushes the following ones back instead of bursting.
#[derive(Debug)]
pub struct RateLimiter {
    period: Duration,
    interval: tokio::time::Interval,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let period = if period.is_zero() {
            Duration::from_millis(1)
        } else {
            period
        };
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        let instant = self.interval.tick().await;
        trace!(period_ms = self.period.as_millis() as u64, "rate limiter tick");
        instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_secs(2));
        let first = limiter.tick().await;
        assert_eq!(first - start, Duration::from_secs(2));
        let second = limiter.tick().await;
        assert_eq!(second - first, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn late_ticks_are_delayed_not_bursted() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.tick().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let resumed = Instant::now();
        limiter.tick().await;
        let next = limiter.tick().await;
        assert_eq!(next - resumed, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_period_is_clamped() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert_eq!(limiter.period(), Duration::from_millis(1));
    }
}
