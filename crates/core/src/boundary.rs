// Scheduled daily reset ("cron") boundary calculation.
//
// The service rolls the day over at a fixed wall-clock time in a fixed
// zone. The most recent such instant at or before "now" is the boundary
// a local checkpoint has to reach before the day counts as synced.

use chrono::{DateTime, Duration, LocalResult, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone the service resets in unless configured otherwise.
pub const DEFAULT_ZONE: Tz = chrono_tz::EST5EDT;

/// When and where the daily reset happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSchedule {
    pub reset_time: NaiveTime,
    pub zone: Tz,
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self {
            reset_time: NaiveTime::from_hms_opt(4, 0, 0).expect("04:00 is a valid time of day"),
            zone: DEFAULT_ZONE,
        }
    }
}

impl CronSchedule {
    pub fn new(reset_time: NaiveTime, zone: Tz) -> Self {
        Self { reset_time, zone }
    }

    /// Most recent scheduled reset at or before `now`.
    pub fn boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        last_reset_boundary(now, self.reset_time, self.zone)
    }
}

/// Compute the most recent occurrence of `reset_time` in `zone` that is
/// not later than `now`.
///
/// Clock changes are not corrected for: the calendar date and the reset
/// time are combined as wall-clock values. An ambiguous wall time takes
/// its earlier instance and a skipped one borrows the UTC offset in effect
/// at `now`, so on transition days the result can be off by the offset
/// delta.
pub fn last_reset_boundary(now: DateTime<Utc>, reset_time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&zone);
    let reset_date = if local.time() >= reset_time {
        local.date_naive()
    } else {
        local.date_naive() - Duration::days(1)
    };
    let wall = reset_date.and_time(reset_time);

    match zone.from_local_datetime(&wall) {
        LocalResult::Single(instant) => instant.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let offset_secs = local.offset().fix().local_minus_utc();
            (wall - Duration::seconds(i64::from(offset_secs))).and_utc()
        }
    }
}
