//! SQLite repositories
//!
//! JSON-shaped columns are stored as TEXT and timestamps as RFC 3339 strings.

pub mod audit;
pub mod counters;
pub mod interventions;
pub mod photos;
pub mod retry;
pub mod steps;

pub use counters::SqliteCounterStore;
pub use retry::{max_lock_wait_ms, retry_on_lock};

use ppfw_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn to_u8(column: &str, value: i64) -> Result<u8> {
    u8::try_from(value)
        .map_err(|_| Error::Internal(format!("{} out of range: {}", column, value)))
}

pub(crate) fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", column, e)))
}
