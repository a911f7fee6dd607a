//! Column decoding helpers shared by the row wrappers.

use std::str::FromStr;

use serde::de::DeserializeOwned;

use tenanthub_domain::time::{self, Timestamp};

fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

/// Parse a column stored in its `Display` form (ids, event kinds).
pub(crate) fn parse<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(value).map_err(decode_error)
}

/// Parse an RFC 3339 timestamp.
pub(crate) fn timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    time::parse_rfc3339(value).map_err(decode_error)
}

/// Parse a JSON text column.
pub(crate) fn json<T: DeserializeOwned>(value: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(value).map_err(decode_error)
}
