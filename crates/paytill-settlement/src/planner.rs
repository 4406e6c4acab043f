//! Settlement timing arithmetic
//!
//! Pure clock math, no store access. The engine feeds it the current time so
//! tests can pin the clock.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use paytill_types::Frequency;

/// Days of wallet history covered by an automatic settlement period
pub const AUTO_LOOKBACK_DAYS: i64 = 7;

/// Days of wallet history covered by a manually requested settlement period
pub const MANUAL_LOOKBACK_DAYS: i64 = 30;

/// Distance of the far-future sentinel used for MANUAL schedules, in days
pub const MANUAL_SENTINEL_DAYS: i64 = 365;

/// The next due instant for `frequency`, strictly after `now`.
///
/// - DAILY: the next midnight UTC.
/// - WEEKLY: the next Monday midnight UTC. A run on a Monday schedules the
///   following Monday, never the same day.
/// - MANUAL: `now + 365 days`. Manual schedules never come due on their own;
///   the sentinel only keeps the field populated.
pub fn next_settlement(frequency: Frequency, now: DateTime<Utc>) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => midnight_after(now, 1),
        Frequency::Weekly => {
            let days_ahead = 7 - i64::from(now.weekday().num_days_from_monday());
            midnight_after(now, days_ahead)
        }
        Frequency::Manual => now + Duration::days(MANUAL_SENTINEL_DAYS),
    }
}

/// The wallet history window swept by a settlement created at `now`
pub fn settlement_period(
    now: DateTime<Utc>,
    lookback_days: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - Duration::days(lookback_days), now)
}

fn midnight_after(now: DateTime<Utc>, days_ahead: i64) -> DateTime<Utc> {
    let date = (now + Duration::days(days_ahead)).date_naive();
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
