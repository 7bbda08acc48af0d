// Expected-progress schedule calculation
//
// A project's schedule is a linear ramp from zero to its total unit count
// over the declared time window, sampled at whole-day steps. Generation is
// pure; the caller decides when the result is persisted onto the project.

use crate::models::SchedulePoint;
use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Generate the expected-progress curve for a project window.
///
/// Produces `ceil(duration_days) + 1` points inclusive of both ends, with
/// `expected_count` ramping linearly from 0 at `start` to `total_units` at
/// `end`. The final point is clamped to `end` when the window is not a whole
/// number of days. Returns an empty schedule for a degenerate window
/// (`end <= start`).
pub fn generate_schedule(
    total_units: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<SchedulePoint> {
    let duration_ms = end.timestamp_millis() - start.timestamp_millis();
    if duration_ms <= 0 {
        return Vec::new();
    }

    let days = (duration_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    let mut schedule = Vec::with_capacity(days as usize + 1);
    for d in 0..=days {
        let timestamp = (start + Duration::days(d)).min(end);
        let ratio = (d as f64 / days as f64).min(1.0);
        schedule.push(SchedulePoint {
            timestamp,
            expected_count: (total_units as f64 * ratio).round() as i64,
        });
    }
    schedule
}

/// Look up the expected count as of `at` on a cached schedule.
///
/// Step-function semantics: returns the `expected_count` of the latest point
/// whose timestamp does not exceed `at`, and 0 when `at` precedes every
/// point or the schedule is empty. No interpolation between points.
pub fn expected_count_at(schedule: &[SchedulePoint], at: DateTime<Utc>) -> i64 {
    let mut expected = 0;
    for point in schedule {
        if point.timestamp <= at {
            expected = point.expected_count;
        } else {
            break;
        }
    }
    expected
}
