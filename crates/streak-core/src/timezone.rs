//! Client-reported timezone offsets.
//!
//! The offset is a signed, possibly fractional, number of hours that the
//! client adds to UTC to get its wall clock. It is trusted as reported.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TimezoneOffset(f64);

impl TimezoneOffset {
    pub const UTC: TimezoneOffset = TimezoneOffset(0.0);

    pub fn from_hours(hours: f64) -> Result<Self, ValidationError> {
        if hours.is_finite() && hours.abs() < 24.0 {
            Ok(Self(hours))
        } else {
            Err(ValidationError::InvalidTimezoneOffset(hours))
        }
    }

    /// Offset of the machine's local timezone right now.
    pub fn local() -> Self {
        let seconds = chrono::Local::now().offset().local_minus_utc();
        Self(f64::from(seconds) / 3600.0)
    }

    pub fn hours(self) -> f64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::milliseconds((self.0 * MS_PER_HOUR).round() as i64)
    }

    /// Shifts a UTC instant onto the client's wall clock.
    pub fn apply(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant + self.as_duration()
    }

    /// Calendar date of `instant` on the client's wall clock.
    pub fn local_date(self, instant: DateTime<Utc>) -> NaiveDate {
        self.apply(instant).date_naive()
    }

    /// Whether two instants fall on the same local calendar day.
    pub fn same_local_day(self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.local_date(a) == self.local_date(b)
    }
}

impl TryFrom<f64> for TimezoneOffset {
    type Error = ValidationError;

    fn try_from(hours: f64) -> Result<Self, Self::Error> {
        TimezoneOffset::from_hours(hours)
    }
}

impl From<TimezoneOffset> for f64 {
    fn from(offset: TimezoneOffset) -> Self {
        offset.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_non_finite_and_out_of_range() {
        assert!(TimezoneOffset::from_hours(f64::NAN).is_err());
        assert!(TimezoneOffset::from_hours(f64::INFINITY).is_err());
        assert!(TimezoneOffset::from_hours(24.0).is_err());
        assert!(TimezoneOffset::from_hours(-24.0).is_err());
        assert!(TimezoneOffset::from_hours(-12.0).is_ok());
        assert!(TimezoneOffset::from_hours(14.0).is_ok());
    }

    #[test]
    fn fractional_hours_shift_by_minutes() {
        let offset = TimezoneOffset::from_hours(5.75).unwrap();
        let utc = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            offset.apply(utc),
            Utc.with_ymd_and_hms(2025, 1, 1, 5, 45, 0).unwrap()
        );
    }

    #[test]
    fn local_date_crosses_midnight() {
        let late_evening_utc = Utc.with_ymd_and_hms(2025, 6, 10, 22, 30, 0).unwrap();
        let east = TimezoneOffset::from_hours(3.0).unwrap();
        let west = TimezoneOffset::from_hours(-5.0).unwrap();
        assert_eq!(
            east.local_date(late_evening_utc),
            NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()
        );
        assert_eq!(
            west.local_date(late_evening_utc),
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
        );
    }

    #[test]
    fn same_local_day_depends_on_offset() {
        let a = Utc.with_ymd_and_hms(2025, 6, 10, 20, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 6, 11, 2, 0, 0).unwrap();
        assert!(!TimezoneOffset::UTC.same_local_day(a, b));
        assert!(TimezoneOffset::from_hours(-6.0).unwrap().same_local_day(a, b));
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<TimezoneOffset>("5.5").is_ok());
        assert!(serde_json::from_str::<TimezoneOffset>("30").is_err());
    }
}
