//! Rotation trigger evaluation

use chrono::{DateTime, Utc};

use super::RotationPolicy;
use crate::writer::WriterState;

/// Decide whether the active file must rotate before appending `incoming_len` bytes
/// of a record stamped `record_timestamp`
///
/// Size fires once the file has reached `max_file_size`, or when a non-empty file
/// would cross it with this record. A record larger than the limit still goes into
/// an empty file whole. The calendar trigger fires when the record falls into a
/// different period than the last rotation. Pure.
pub fn should_rotate(
    state: &WriterState,
    policy: &RotationPolicy,
    record_timestamp: DateTime<Utc>,
    incoming_len: u64,
) -> bool {
    let by_size = policy.max_file_size.is_some_and(|max| {
        state.current_size >= max
            || (state.current_size > 0 && state.current_size.saturating_add(incoming_len) > max)
    });

    let by_time = policy.interval.is_some_and(|interval| {
        interval.period_key(state.last_rotation) != interval.period_key(record_timestamp)
    });

    by_size || by_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::RotationInterval;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn state(size: u64, last_rotation: DateTime<Utc>) -> WriterState {
        WriterState {
            active_path: PathBuf::from("/tmp/app.log"),
            current_size: size,
            last_rotation,
        }
    }

    #[test]
    fn test_no_triggers_never_rotate() {
        let policy = RotationPolicy::default();
        let s = state(u64::MAX, ts(2020, 1, 1, 0, 0, 0));
        assert!(!should_rotate(&s, &policy, ts(2030, 1, 1, 0, 0, 0), 0));
    }

    #[test]
    fn test_size_trigger_at_threshold() {
        let policy = RotationPolicy::default().with_max_file_size(100);
        let now = ts(2024, 1, 1, 0, 0, 0);
        assert!(!should_rotate(&state(99, now), &policy, now, 0));
        assert!(should_rotate(&state(100, now), &policy, now, 0));
        assert!(should_rotate(&state(150, now), &policy, now, 0));
    }

    #[test]
    fn test_size_trigger_when_record_would_cross() {
        let policy = RotationPolicy::default().with_max_file_size(10);
        let now = ts(2024, 1, 1, 0, 0, 0);
        assert!(should_rotate(&state(9, now), &policy, now, 9));
        assert!(should_rotate(&state(5, now), &policy, now, 6));
        assert!(!should_rotate(&state(5, now), &policy, now, 5));
        // An oversized record goes into an empty file whole
        assert!(!should_rotate(&state(0, now), &policy, now, 50));
    }

    #[test]
    fn test_daily_trigger_across_midnight() {
        let policy = RotationPolicy::default().with_interval(RotationInterval::Daily);
        let s = state(10, ts(2024, 1, 1, 23, 59, 59));
        assert!(!should_rotate(&s, &policy, ts(2024, 1, 1, 0, 0, 0), 0));
        assert!(should_rotate(&s, &policy, ts(2024, 1, 2, 0, 0, 1), 0));
    }

    #[test]
    fn test_hourly_trigger() {
        let policy = RotationPolicy::default().with_interval(RotationInterval::Hourly);
        let s = state(0, ts(2024, 3, 5, 10, 0, 0));
        assert!(!should_rotate(&s, &policy, ts(2024, 3, 5, 10, 59, 59), 0));
        assert!(should_rotate(&s, &policy, ts(2024, 3, 5, 11, 0, 0), 0));
        // Same hour on another day is another period
        assert!(should_rotate(&s, &policy, ts(2024, 3, 6, 10, 0, 0), 0));
    }

    #[test]
    fn test_weekly_trigger() {
        let policy = RotationPolicy::default().with_interval(RotationInterval::Weekly);
        // 2024-01-01 is a Monday
        let s = state(0, ts(2024, 1, 1, 0, 0, 0));
        assert!(!should_rotate(&s, &policy, ts(2024, 1, 7, 23, 59, 59), 0));
        assert!(should_rotate(&s, &policy, ts(2024, 1, 8, 0, 0, 0), 0));
    }

    #[test]
    fn test_monthly_trigger() {
        let policy = RotationPolicy::default().with_interval(RotationInterval::Monthly);
        let s = state(0, ts(2024, 1, 15, 0, 0, 0));
        assert!(!should_rotate(&s, &policy, ts(2024, 1, 31, 23, 59, 59), 0));
        assert!(should_rotate(&s, &policy, ts(2024, 2, 1, 0, 0, 0), 0));
        assert!(should_rotate(&s, &policy, ts(2025, 1, 15, 0, 0, 0), 0));
    }

    #[test]
    fn test_triggers_are_ored() {
        let policy = RotationPolicy::default()
            .with_max_file_size(100)
            .with_interval(RotationInterval::Daily);
        let day = ts(2024, 1, 1, 12, 0, 0);
        assert!(should_rotate(&state(100, day), &policy, day, 0));
        assert!(should_rotate(&state(0, day), &policy, ts(2024, 1, 2, 0, 0, 0), 0));
        assert!(!should_rotate(&state(0, day), &policy, day, 0));
    }
}
