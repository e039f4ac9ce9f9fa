//! Temporal primitives: instants, week-day mapping, and the two tunable
//! constants the rest of the core is built around.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};

/// Maximum gap at which two adjacent intervals of matching identity are
/// coalesced by [`crate::domain::algebra::join_into`].
pub const JOIN_GAP: chrono::Duration = chrono::Duration::minutes(5);

/// Default look-ahead horizon for schedule materialization when a caller
/// doesn't specify an explicit end date.
pub const EXTENDABLE_MIN_DAYS: i64 = 40;

/// All stored instants are UTC. A naive wall-clock time on a schedule
/// fragment is assumed to already be in this timezone.
pub type Instant = DateTime<Utc>;

/// `date` at local midnight, represented as a UTC instant.
///
/// The system has no per-resource timezone concept; "local" here means UTC.
pub fn date_to_instant(date: NaiveDate) -> Instant {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Internal week-day index: Sunday=0 .. Saturday=6.
pub fn week_day_of(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Same mapping, for a full instant.
pub fn week_day_of_instant(instant: Instant) -> u8 {
    week_day_of(instant.date_naive())
}

/// Renders a span as `H:MM:SS` (sign-prefixed when negative), the shape the
/// event sink's `timedelta` payload field carries alongside the numeric
/// `duration` in seconds.
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();
    let sign = if total_seconds < 0 { "-" } else { "" };
    let total_seconds = total_seconds.abs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{sign}{hours}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn sunday_is_zero() {
        // 2024-01-07 is a Sunday.
        let d = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(week_day_of(d), 0);
    }

    #[test]
    fn saturday_is_six() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
        assert_eq!(week_day_of(d), 6);
    }

    #[test]
    fn monday_is_one() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(week_day_of(d), 1);
    }

    #[test]
    fn date_to_instant_is_midnight_utc() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let instant = date_to_instant(d);
        assert_eq!(instant.time(), NaiveTime::MIN);
    }

    #[test]
    fn format_duration_pads_minutes_and_seconds() {
        let d = chrono::Duration::seconds(3661);
        assert_eq!(format_duration(d), "1:01:01");
    }
}
