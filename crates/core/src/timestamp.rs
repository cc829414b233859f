//! Timestamp parsing for the remote API's date formats.
//!
//! The remote API emits `2024-01-15T10:30:00.000+0000` (no colon in the offset),
//! which is not valid RFC 3339. Both forms are accepted and normalized to UTC.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

/// Parse a remote timestamp into a UTC `OffsetDateTime`.
pub fn parse_timestamp(s: &str) -> crate::Result<OffsetDateTime> {
    let s = s.trim();
    let parsed = OffsetDateTime::parse(s, &Rfc3339).or_else(|_| {
        OffsetDateTime::parse(
            s,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory][offset_minute]"
            ),
        )
    });

    parsed
        .map(|ts| ts.to_offset(UtcOffset::UTC))
        .map_err(|e| crate::Error::InvalidTimestamp(format!("{s}: {e}")))
}

/// Parse a calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> crate::Result<Date> {
    let s = s.trim();
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map_err(|e| crate::Error::InvalidDate(format!("{s}: {e}")))
}

/// Parse an optional timestamp field, treating empty strings as absent.
pub fn parse_optional_timestamp(s: Option<&str>) -> crate::Result<Option<OffsetDateTime>> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value).map(Some),
    }
}

/// Parse an optional date field, treating empty strings as absent.
pub fn parse_optional_date(s: Option<&str>) -> crate::Result<Option<Date>> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}
