//! Time-decay weighting for aggregated counts.
//!
//! The count-store contract only requires decay to be a monotonically
//! non-increasing, non-negative function of elapsed time. The concrete curve
//! is pluggable; this module supplies the exponential default used by the
//! in-memory store, parameterized by the per-query `decay` rate.
//!
//! The rate is expressed per day: a rate of 1.0 halves-ish a count over the
//! first day (`e^-1 ≈ 0.37`), a rate of 0.0 disables decay entirely.

/// Seconds in one day, the unit the decay rate is expressed against.
const SECS_PER_DAY: f64 = 86_400.0;

/// Exponential decay factor for a count last touched `elapsed_secs` ago.
///
/// Returns a value in (0.0, 1.0]. A non-positive rate or elapsed time yields
/// 1.0 (no decay).
#[inline]
pub fn exponential(elapsed_secs: f64, rate_per_day: f64) -> f64 {
    if elapsed_secs <= 0.0 || rate_per_day <= 0.0 {
        return 1.0;
    }
    (-rate_per_day * (elapsed_secs / SECS_PER_DAY)).exp()
}

/// Decay factor between two epoch-second timestamps.
///
/// `count_time` newer than `now` is treated as no elapsed time.
#[inline]
pub fn between(count_time: i64, now: i64, rate_per_day: f64) -> f64 {
    exponential((now - count_time) as f64, rate_per_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_decay_at_zero_elapsed() {
        assert_eq!(exponential(0.0, 1.0), 1.0);
        assert_eq!(exponential(-5.0, 1.0), 1.0);
    }

    #[test]
    fn test_zero_rate_is_neutral() {
        assert_eq!(exponential(SECS_PER_DAY * 30.0, 0.0), 1.0);
        assert_eq!(exponential(123.0, -1.0), 1.0);
    }

    #[test]
    fn test_monotonically_non_increasing() {
        let mut last = 1.0;
        for days in 0..60 {
            let f = exponential(days as f64 * SECS_PER_DAY, 0.5);
            assert!(f <= last, "decay increased at day {days}");
            assert!(f > 0.0);
            last = f;
        }
    }

    #[test]
    fn test_one_day_at_unit_rate() {
        let f = exponential(SECS_PER_DAY, 1.0);
        assert!((f - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_future_timestamps_not_boosted() {
        assert_eq!(between(2_000, 1_000, 1.0), 1.0);
    }
}
