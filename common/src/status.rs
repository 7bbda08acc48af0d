// Tolerance-banded status classification
//
// Actual-vs-expected deviation is classified against a band of 1% of the
// expected count, with an absolute floor of one unit so that small expected
// values still get a usable band.

use crate::models::ProgressStatus;

/// Classify an actual count against an expected count.
///
/// Returns the status together with the signed deviation
/// (`actual - expected`). The tolerance is `max(1, round(expected * 0.01))`;
/// deviations strictly beyond the band classify as ahead or delayed.
pub fn classify(actual: i64, expected: i64) -> (ProgressStatus, i64) {
    let deviation = actual - expected;
    let tolerance = tolerance_for(expected);
    let status = if deviation > tolerance {
        ProgressStatus::Ahead
    } else if deviation < -tolerance {
        ProgressStatus::Delayed
    } else {
        ProgressStatus::OnTime
    };
    (status, deviation)
}

/// The on-time band half-width for a given expected count.
pub fn tolerance_for(expected: i64) -> i64 {
    ((expected as f64 * 0.01).round() as i64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_on_time() {
        let (status, deviation) = classify(50, 50);
        assert_eq!(status, ProgressStatus::OnTime);
        assert_eq!(deviation, 0);
    }

    #[test]
    fn test_tolerance_floor_is_one_unit() {
        assert_eq!(tolerance_for(0), 1);
        assert_eq!(tolerance_for(10), 1);
        // 1% of 50 rounds to 1, not 0
        assert_eq!(tolerance_for(50), 1);
        assert_eq!(tolerance_for(150), 2);
    }

    #[test]
    fn test_deviation_within_band_is_on_time() {
        // tolerance for 100 is 1
        assert_eq!(classify(101, 100).0, ProgressStatus::OnTime);
        assert_eq!(classify(99, 100).0, ProgressStatus::OnTime);
    }

    #[test]
    fn test_deviation_beyond_band_is_ahead_or_delayed() {
        assert_eq!(classify(102, 100).0, ProgressStatus::Ahead);
        assert_eq!(classify(98, 100).0, ProgressStatus::Delayed);
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // 1% of 150 is 1.5, rounding up to 2
        assert_eq!(classify(152, 150).0, ProgressStatus::OnTime);
        assert_eq!(classify(153, 150).0, ProgressStatus::Ahead);
    }

    #[test]
    fn test_zero_expected_still_classifies() {
        assert_eq!(classify(0, 0).0, ProgressStatus::OnTime);
        assert_eq!(classify(1, 0).0, ProgressStatus::OnTime);
        assert_eq!(classify(2, 0).0, ProgressStatus::Ahead);
    }

    #[test]
    fn test_deviation_is_signed_difference() {
        assert_eq!(classify(60, 7).1, 53);
        assert_eq!(classify(3, 7).1, -4);
    }
}
