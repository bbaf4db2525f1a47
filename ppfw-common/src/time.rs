//! Timestamp utilities

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an RFC 3339 timestamp column into UTC
pub fn parse_rfc3339(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse an optional RFC 3339 timestamp column into UTC
pub fn parse_rfc3339_opt(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_rfc3339(column, &s)).transpose()
}
