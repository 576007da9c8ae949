//! Schedule hint for the battery-powered client: how long it may sleep
//! before the panel content is next expected to change.

use chrono::{DateTime, LocalResult, NaiveTime, TimeDelta, TimeZone};

/// Next occurrence of the local time of day `at`. If `now` is already at or
/// past `at` today, the target is tomorrow.
pub fn next_refresh<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let local = now.naive_local();
    let mut day = local.date();
    if local.time() >= at {
        day = day.succ_opt().unwrap_or(day);
    }
    let target = day.and_time(at);
    match now.timezone().from_local_datetime(&target) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // `at` falls in a DST gap that day; an hour later exists
        LocalResult::None => now
            .timezone()
            .from_local_datetime(&(target + TimeDelta::hours(1)))
            .earliest()
            .unwrap_or_else(|| now.clone() + TimeDelta::days(1)),
    }
}

/// Whole seconds from `now` until [`next_refresh`].
pub fn seconds_until_refresh<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> i64 {
    next_refresh(now, at).signed_duration_since(now.clone()).num_seconds()
}
