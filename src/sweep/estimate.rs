//! Wall-clock duration estimation for a set of cases.

/// Average observed latency of one remote inference call, in seconds.
pub const AVG_CASE_LATENCY_SECS: f64 = 30.0;

/// Overhead buffer applied on top of the raw per-case sum.
pub const OVERHEAD_FACTOR: f64 = 1.2;

/// Estimates never drop below this floor.
pub const MIN_ESTIMATE_MINUTES: u64 = 5;

/// Estimate wall-clock minutes for `case_count` sequential cases with
/// `delay_secs` of pacing between them.
///
/// `ceil(N x (avg_latency + D) / 60 x 1.2)`, floored at 5 minutes.
/// Monotonically non-decreasing in both N and D.
pub fn estimate_minutes(case_count: usize, delay_secs: f64) -> u64 {
    let per_case = AVG_CASE_LATENCY_SECS + delay_secs.max(0.0);
    let minutes = (case_count as f64 * per_case / 60.0 * OVERHEAD_FACTOR).ceil() as u64;
    minutes.max(MIN_ESTIMATE_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_scenario() {
        // 9 cases, 5s delay: ceil(9 * 35 / 60 * 1.2) = ceil(6.3) = 7
        assert_eq!(estimate_minutes(9, 5.0), 7);
    }

    #[test]
    fn test_floor_at_five_minutes() {
        assert_eq!(estimate_minutes(0, 0.0), 5);
        assert_eq!(estimate_minutes(1, 0.0), 5);
    }

    #[test]
    fn test_monotone_in_case_count() {
        let mut prev = 0;
        for n in 0..500 {
            let est = estimate_minutes(n, 5.0);
            assert!(est >= prev, "estimate dropped at n={}", n);
            prev = est;
        }
    }

    #[test]
    fn test_monotone_in_delay() {
        let mut prev = 0;
        for d in 0..120 {
            let est = estimate_minutes(50, d as f64);
            assert!(est >= prev, "estimate dropped at delay={}", d);
            prev = est;
        }
    }

    #[test]
    fn test_negative_delay_treated_as_zero() {
        assert_eq!(estimate_minutes(100, -5.0), estimate_minutes(100, 0.0));
    }
}
