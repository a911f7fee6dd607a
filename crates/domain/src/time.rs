//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for event dates, received dates and creation dates.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse an RFC 3339 timestamp with any offset into UTC.
///
/// # Errors
///
/// Returns the chrono parse error for malformed input.
pub fn parse_rfc3339(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.to_utc())
}
