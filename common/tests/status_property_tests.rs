// Property-based tests for tolerance-banded status classification

use common::models::ProgressStatus;
use common::status::{classify, tolerance_for};
use proptest::prelude::*;

proptest! {
    // One past either edge of the band always leaves on-time territory.
    #[test]
    fn band_edges_are_strict(expected in 0i64..1_000_000) {
        let tol = tolerance_for(expected);
        prop_assert_eq!(classify(expected + tol + 1, expected).0, ProgressStatus::Ahead);
        prop_assert_eq!(classify(expected - tol - 1, expected).0, ProgressStatus::Delayed);
        prop_assert_eq!(classify(expected, expected).0, ProgressStatus::OnTime);
    }

    // Everything inside the band, inclusive, is on-time.
    #[test]
    fn within_band_is_on_time(expected in 0i64..1_000_000, offset in -1_000_000i64..1_000_000) {
        let tol = tolerance_for(expected);
        let clamped = offset.clamp(-tol, tol);
        prop_assert_eq!(classify(expected + clamped, expected).0, ProgressStatus::OnTime);
    }

    // The tolerance never drops below one unit and tracks 1% of expected.
    #[test]
    fn tolerance_has_unit_floor(expected in 0i64..1_000_000) {
        let tol = tolerance_for(expected);
        prop_assert!(tol >= 1);
        prop_assert!((tol as f64 - expected as f64 * 0.01).abs() <= 1.0);
    }

    // Deviation is always the signed difference, independent of status.
    #[test]
    fn deviation_is_signed_difference(actual in -1_000_000i64..1_000_000, expected in 0i64..1_000_000) {
        prop_assert_eq!(classify(actual, expected).1, actual - expected);
    }
}
