//! POST /api/interventions/:id/validate

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{optional_object, Caller, InterventionPath};
use crate::error::{ApiError, ApiResult};
use crate::models::{ValidationOptions, ValidationResult};
use crate::workflow::service;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ValidationMetadata {
    pub intervention_id: Uuid,
    pub validation_timestamp: DateTime<Utc>,
    pub validation_options: ValidationOptions,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    #[serde(flatten)]
    pub result: ValidationResult,
    pub metadata: ValidationMetadata,
}

/// Compliance report; never mutates state
///
/// Optional body: `{validateSteps?, validatePhotos?, validateCompliance?, strictMode?}`
pub async fn validate_intervention(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(_caller): Caller,
    body: Bytes,
) -> ApiResult<Json<ValidateResponse>> {
    let body = optional_object(&body)?;
    let options: ValidationOptions = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::MalformedInput(format!("Invalid validation options: {}", e)))?;

    let result = service::evaluate(&state.db, &state.scorer, id, &options).await?;

    Ok(Json(ValidateResponse {
        result,
        metadata: ValidationMetadata {
            intervention_id: id,
            validation_timestamp: Utc::now(),
            validation_options: options,
        },
    }))
}

pub fn validation_routes() -> Router<AppState> {
    Router::new().route("/api/interventions/:id/validate", post(validate_intervention))
}
