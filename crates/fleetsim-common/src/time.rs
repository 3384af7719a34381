//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the generator runtime."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::time::Duration;

/// Signed difference between an observed and an expected interval, in microseconds.
pub fn jitter_us(actual: Duration, expected: Duration) -> i64 {
    let actual_us = actual.as_secs_f64() * 1_000_000.0;
    let expected_us = expected.as_secs_f64() * 1_000_000.0;
    (actual_us - expected_us).round() as i64
}

/// Interval for a tick period expressed in whole seconds. Zero maps to one second.
pub fn period_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_signed() {
        let late = jitter_us(Duration::from_millis(1_002), Duration::from_secs(1));
        let early = jitter_us(Duration::from_millis(998), Duration::from_secs(1));
        assert_eq!(late, 2_000);
        assert_eq!(early, -2_000);
    }

    #[test]
    fn zero_period_becomes_one_second() {
        assert_eq!(period_from_secs(0), Duration::from_secs(1));
        assert_eq!(period_from_secs(60), Duration::from_secs(60));
    }
}
