//! Inclusive day count of a run.

use chrono::{DateTime, Utc};

use crate::timezone::TimezoneOffset;

/// Number of calendar days covered by `start..=end`.
///
/// Both instants are reduced to their local calendar date first, so time of
/// day never matters: a run that starts and ends on the same day has length 1.
/// The result is always at least 1.
pub fn run_length(start: DateTime<Utc>, end: DateTime<Utc>, offset: TimezoneOffset) -> u32 {
    let start_day = offset.local_date(start);
    let end_day = offset.local_date(end);
    let days = (end_day - start_day).num_days().unsigned_abs();
    u32::try_from(days).unwrap_or(u32::MAX - 1) + 1
}
