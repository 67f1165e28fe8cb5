//! Parsing and serialization of the export's timestamp formats.
//!
//! The export uses exactly one datetime pattern (`2020-01-01 12:34:56 +0100`)
//! and one bare-date pattern (`2020-01-01`). Anything else is malformed; there
//! are no fallback formats. Storage-side timestamps use RFC 3339 so that a
//! stored string parses back to the identical instant.

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

/// Datetime pattern used by `startDate`, `endDate` and `creationDate`.
pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Bare-date pattern used by activity summary `dateComponents`.
pub const EXPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors for timestamp and date parsing.
#[derive(Debug, Error)]
pub enum TemporalError {
    #[error("malformed timestamp '{0}': expected 'YYYY-MM-DD HH:MM:SS +HHMM'")]
    MalformedTimestamp(String),

    #[error("malformed date '{0}': expected 'YYYY-MM-DD'")]
    MalformedDate(String),
}

/// Parse an export datetime string into a timezone-aware instant.
pub fn parse_export_datetime(value: &str) -> Result<DateTime<FixedOffset>, TemporalError> {
    DateTime::parse_from_str(value, EXPORT_DATETIME_FORMAT)
        .map_err(|_| TemporalError::MalformedTimestamp(value.to_string()))
}

/// Parse an export bare date into a calendar day.
pub fn parse_export_date(value: &str) -> Result<NaiveDate, TemporalError> {
    NaiveDate::parse_from_str(value, EXPORT_DATE_FORMAT)
        .map_err(|_| TemporalError::MalformedDate(value.to_string()))
}

/// Canonical storage rendering of an instant.
pub fn format_storage_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Parse a storage-side timestamp back into the identical instant.
pub fn parse_storage_datetime(value: &str) -> Result<DateTime<FixedOffset>, TemporalError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|_| TemporalError::MalformedTimestamp(value.to_string()))
}

/// Canonical storage rendering of a calendar day.
pub fn format_storage_date(day: &NaiveDate) -> String {
    day.format(EXPORT_DATE_FORMAT).to_string()
}

/// Parse a storage-side calendar day.
pub fn parse_storage_date(value: &str) -> Result<NaiveDate, TemporalError> {
    parse_export_date(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_export_datetime_keeps_offset() {
        let dt = parse_export_datetime("2020-01-01 12:34:56 +0100").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_parse_export_datetime_negative_offset() {
        let dt = parse_export_datetime("2020-06-15 08:00:00 -0700").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_parse_export_datetime_rejects_other_formats() {
        assert!(parse_export_datetime("2020-01-01T12:34:56+01:00").is_err());
        assert!(parse_export_datetime("2020-01-01 12:34:56").is_err());
        assert!(parse_export_datetime("01/01/2020 12:34:56 +0100").is_err());
        assert!(parse_export_datetime("").is_err());
    }

    #[test]
    fn test_storage_round_trip() {
        let original = parse_export_datetime("2020-01-01 10:00:00 +0100").unwrap();
        let stored = format_storage_datetime(&original);
        let parsed = parse_storage_datetime(&stored).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(format_storage_datetime(&parsed), stored);
    }

    #[test]
    fn test_parse_export_date() {
        let day = parse_export_date("2020-01-01").unwrap();
        assert_eq!(format_storage_date(&day), "2020-01-01");
        assert!(parse_export_date("2020/01/01").is_err());
        assert!(parse_export_date("not-a-date").is_err());
    }
}
