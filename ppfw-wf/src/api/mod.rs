//! HTTP API handlers for ppfw-wf

pub mod extract;
pub mod health;
pub mod interventions;
pub mod photos;
pub mod validation;

pub use extract::{Caller, InterventionPath};
pub use health::health_routes;
pub use interventions::intervention_routes;
pub use photos::photo_routes;
pub use validation::validation_routes;

use crate::error::ApiError;
use serde_json::{Map, Value};

/// Optional JSON object body; empty means "no fields"
pub(crate) fn optional_object(bytes: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    crate::workflow::collector::parse_body(bytes).map_err(ApiError::MalformedInput)
}
