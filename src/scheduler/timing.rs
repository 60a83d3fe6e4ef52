//! Scheduling days and the cutoff between them

use chrono::{FixedOffset, Local, Offset};

use crate::timestamp::TimestampSecs;

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedTimingToday {
    /// The clock reading everything else was derived from
    pub now: TimestampSecs,
    /// Days since the collection was created; review dues are measured in these
    pub days_elapsed: u32,
    /// When the next scheduling day starts
    pub next_day_at: TimestampSecs,
}

/// Days counted in whole 24h blocks from the creation stamp, as the legacy
/// scheduler did. The cutoff drifts with daylight saving changes.
pub fn v1_timing_today(created: TimestampSecs, now: TimestampSecs) -> SchedTimingToday {
    let days_elapsed = ((now.0 - created.0) / SECS_PER_DAY).max(0);
    SchedTimingToday {
        now,
        days_elapsed: days_elapsed as u32,
        next_day_at: TimestampSecs(created.0 + (days_elapsed + 1) * SECS_PER_DAY),
    }
}

/// Days counted in local time, each starting at `rollover_hour`.
pub fn local_timing_today(
    created: TimestampSecs,
    now: TimestampSecs,
    offset: FixedOffset,
    rollover_hour: u8,
) -> SchedTimingToday {
    let shift = offset.local_minus_utc() as i64 - rollover_hour.min(23) as i64 * 3600;
    let local_day = |stamp: TimestampSecs| (stamp.0 + shift).div_euclid(SECS_PER_DAY);

    let today = local_day(now);
    let days_elapsed = (today - local_day(created)).max(0);
    SchedTimingToday {
        now,
        days_elapsed: days_elapsed as u32,
        next_day_at: TimestampSecs((today + 1) * SECS_PER_DAY - shift),
    }
}

/// The machine's current UTC offset.
pub fn local_utc_offset() -> FixedOffset {
    Local::now().offset().fix()
}

impl SchedTimingToday {
    /// Seconds since the epoch at which `day` starts.
    pub fn day_starts_at(&self, day: u32) -> TimestampSecs {
        let days_ahead = day as i64 - self.days_elapsed as i64;
        TimestampSecs(self.next_day_at.0 + (days_ahead - 1) * SECS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14 22:13:20 UTC
    const NOW: i64 = 1_700_000_000;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_v1_counts_whole_days_from_creation() {
        let created = TimestampSecs(NOW - 3 * SECS_PER_DAY - 10);
        let timing = v1_timing_today(created, TimestampSecs(NOW));
        assert_eq!(timing.days_elapsed, 3);
        assert_eq!(timing.next_day_at.0, created.0 + 4 * SECS_PER_DAY);
        assert!(timing.next_day_at.0 > NOW);
    }

    #[test]
    fn test_local_rollover_hour() {
        let created = TimestampSecs(NOW - 2 * SECS_PER_DAY);
        let timing = local_timing_today(created, TimestampSecs(NOW), utc(), 4);
        assert_eq!(timing.days_elapsed, 2);
        // next cutoff is 04:00 UTC on 2023-11-15
        assert_eq!(timing.next_day_at.0, 1_700_020_800);

        // just before the cutoff is still the same day, just after is the next
        let before = local_timing_today(created, TimestampSecs(1_700_020_799), utc(), 4);
        let after = local_timing_today(created, TimestampSecs(1_700_020_800), utc(), 4);
        assert_eq!(before.days_elapsed, 2);
        assert_eq!(after.days_elapsed, 3);
    }

    #[test]
    fn test_offset_moves_the_cutoff() {
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let timing = local_timing_today(TimestampSecs(NOW), TimestampSecs(NOW), plus_ten, 4);
        assert_eq!(timing.days_elapsed, 0);
        // local time is 08:13 on the 15th, so the next cutoff is 04:00 local on the 16th
        assert_eq!(timing.next_day_at.0, 1_700_071_200);
    }

    #[test]
    fn test_now_before_creation_is_day_zero() {
        let timing = local_timing_today(TimestampSecs(NOW), TimestampSecs(NOW - 5 * SECS_PER_DAY), utc(), 4);
        assert_eq!(timing.days_elapsed, 0);
    }

    #[test]
    fn test_day_starts_at() {
        let timing = local_timing_today(TimestampSecs(NOW), TimestampSecs(NOW), utc(), 4);
        assert_eq!(timing.day_starts_at(timing.days_elapsed + 1), timing.next_day_at);
        assert_eq!(timing.day_starts_at(timing.days_elapsed).0, timing.next_day_at.0 - SECS_PER_DAY);
    }
}
