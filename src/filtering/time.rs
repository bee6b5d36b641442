// Timestamp normalization and recency checks
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Result, VidsiftError};
use crate::record::RawTimestamp;

/// Naive formats tried in order; naive times are read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a creation timestamp.
///
/// Text is tried against [`NAIVE_FORMATS`], then RFC 3339, then as Unix epoch
/// seconds. Numbers are always epoch seconds.
pub fn parse_timestamp(raw: &RawTimestamp) -> Result<DateTime<Utc>> {
    match raw {
        RawTimestamp::Absent => Err(VidsiftError::Parsing("Missing timestamp".to_string())),
        RawTimestamp::Epoch(secs) => from_epoch(*secs),
        RawTimestamp::Text(text) => {
            for format in NAIVE_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                    return Ok(naive.and_utc());
                }
            }

            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Ok(dt.with_timezone(&Utc));
            }

            let secs: f64 = text
                .parse()
                .map_err(|_| VidsiftError::Parsing(format!("Unrecognized timestamp: {:?}", text)))?;
            from_epoch(secs)
        }
    }
}

/// Best-effort ISO-8601 parse (with or without zone) used for reporting.
/// Epoch numbers are accepted, epoch strings are not.
pub fn parse_iso8601(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Absent => None,
        RawTimestamp::Epoch(secs) => from_epoch(*secs).ok(),
        RawTimestamp::Text(text) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc())
        }
    }
}

/// True when `posted` is no more than `hours` before `now`. Future timestamps pass,
/// and a window too wide for `Duration` admits everything.
pub fn within_window(posted: DateTime<Utc>, now: DateTime<Utc>, hours: i64) -> bool {
    match Duration::try_hours(hours) {
        Some(window) => now.signed_duration_since(posted) <= window,
        None => true,
    }
}

/// Fractional hours elapsed between `posted` and `now`
pub fn hours_between(posted: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(posted).num_milliseconds() as f64 / 3_600_000.0
}

fn from_epoch(secs: f64) -> Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(VidsiftError::Parsing(format!("Invalid epoch: {}", secs)));
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| VidsiftError::Parsing(format!("Epoch out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn text(s: &str) -> RawTimestamp {
        RawTimestamp::Text(s.to_string())
    }

    #[test]
    fn test_accepted_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&text("2024-08-05 12:00:00")).unwrap(), expected);
        assert_eq!(parse_timestamp(&text("2024-08-05T12:00:00")).unwrap(), expected);
        assert_eq!(parse_timestamp(&text("2024-08-05T12:00:00Z")).unwrap(), expected);
        assert_eq!(
            parse_timestamp(&text("2024-08-05 12:00:00.250000")).unwrap(),
            expected + Duration::milliseconds(250)
        );
        assert_eq!(
            parse_timestamp(&text("2024-08-05T21:00:00+09:00")).unwrap(),
            expected
        );
    }

    #[test]
    fn test_epoch_inputs() {
        let expected = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&text("1722859200")).unwrap(), expected);
        assert_eq!(
            parse_timestamp(&RawTimestamp::Epoch(1_722_859_200.0)).unwrap(),
            expected
        );
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_timestamp(&RawTimestamp::Absent).is_err());
        assert!(parse_timestamp(&text("yesterday")).is_err());
        assert!(parse_timestamp(&RawTimestamp::Epoch(f64::NAN)).is_err());
    }

    #[test]
    fn test_window() {
        let now = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
        assert!(within_window(now, now, 24));
        assert!(within_window(now - Duration::hours(24), now, 24));
        assert!(!within_window(now - Duration::hours(30), now, 24));
        assert!(within_window(now + Duration::hours(5), now, 24));
        assert!(within_window(now - Duration::days(3650), now, i64::MAX));
    }

    #[test]
    fn test_iso8601_best_effort() {
        let now = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
        assert_eq!(parse_iso8601(&text("2024-08-05T12:00:00Z")), Some(now));
        assert_eq!(parse_iso8601(&text("2024-08-05T12:00:00.000001")).map(|d| d.timestamp()), Some(now.timestamp()));
        assert_eq!(parse_iso8601(&text("2024-08-05 12:00:00")), Some(now));
        assert_eq!(parse_iso8601(&text("1722859200")), None);
        assert_eq!(parse_iso8601(&RawTimestamp::Epoch(1_722_859_200.0)), Some(now));
    }

    #[test]
    fn test_hours_between() {
        let now = Utc.with_ymd_and_hms(2024, 8, 5, 12, 0, 0).unwrap();
        let posted = now - Duration::minutes(90);
        assert!((hours_between(posted, now) - 1.5).abs() < 1e-9);
    }
}
