//! Intervention lifecycle handlers
//!
//! POST /api/interventions, GET /api/interventions/:id,
//! POST /api/interventions/:id/advance, POST /api/interventions/:id/cancel,
//! GET /api/interventions/:id/steps, GET /api/interventions/:id/audit

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{optional_object, Caller, InterventionPath};
use crate::error::{ApiError, ApiResult};
use crate::models::{AdvanceAuditEntry, Intervention, StepRecord};
use crate::workflow::authorizer::check_rate;
use crate::workflow::collector::{parse_body, parse_envelope};
use crate::workflow::{service, workflow_state, WorkflowState};
use crate::AppState;

/// POST /api/interventions request
#[derive(Debug, Default, Deserialize)]
pub struct StartInterventionRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub technician_id: Option<String>,
}

/// Intervention plus its derived workflow position
#[derive(Debug, Serialize)]
pub struct InterventionResponse {
    #[serde(flatten)]
    pub intervention: Intervention,
    pub workflow_state: WorkflowState,
}

impl From<Intervention> for InterventionResponse {
    fn from(intervention: Intervention) -> Self {
        let workflow_state = workflow_state(&intervention);
        Self { intervention, workflow_state }
    }
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    pub intervention: InterventionResponse,
    pub step: StepRecord,
    pub audited: bool,
}

#[derive(Debug, Serialize)]
pub struct StepsResponse {
    pub intervention_id: Uuid,
    pub steps: Vec<StepRecord>,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub intervention_id: Uuid,
    pub entries: Vec<AdvanceAuditEntry>,
}

/// POST /api/interventions
pub async fn start_intervention(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<InterventionResponse>)> {
    let body = optional_object(&body)?;
    let request: StartInterventionRequest = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::MalformedInput(format!("Invalid request: {}", e)))?;

    let intervention = service::start(
        &state.db,
        non_blank(request.client_id),
        non_blank(request.vehicle_id),
        non_blank(request.technician_id),
    )
    .await?;

    tracing::debug!(intervention_id = %intervention.id, caller = %caller.subject, "Start requested");
    Ok((StatusCode::CREATED, Json(intervention.into())))
}

/// GET /api/interventions/:id
pub async fn get_intervention(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(_caller): Caller,
) -> ApiResult<Json<InterventionResponse>> {
    let intervention = service::load(&state.db, id).await?;
    Ok(Json(intervention.into()))
}

/// POST /api/interventions/:id/advance
///
/// Body: `{stepNumber, data?, measurements?, observations?, photo_urls?,
/// force_validation?, supervisor_override?, current_location?, notes?,
/// expected_version?}`
///
/// A malformed body is rejected before the rate counter is touched.
pub async fn advance_intervention(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(caller): Caller,
    body: Bytes,
) -> ApiResult<Json<AdvanceResponse>> {
    let body = parse_body(&body).map_err(ApiError::MalformedInput)?;
    let envelope = parse_envelope(&body).map_err(ApiError::MalformedInput)?;

    check_rate(
        state.counters.as_ref(),
        "advance",
        &caller,
        state.advance_limit,
        Utc::now(),
    )
    .await?;

    let outcome = service::advance(&state.db, &caller, id, &envelope, &body).await?;

    Ok(Json(AdvanceResponse {
        success: true,
        intervention: outcome.intervention.into(),
        step: outcome.step,
        audited: outcome.audited,
    }))
}

/// POST /api/interventions/:id/cancel
///
/// Optional body: `{expected_version?}`
pub async fn cancel_intervention(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(caller): Caller,
    body: Bytes,
) -> ApiResult<Json<InterventionResponse>> {
    let body = optional_object(&body)?;
    let expected_version = match body.get("expected_version") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            ApiError::MalformedInput("expected_version must be an integer".to_string())
        })?),
    };

    let intervention = service::cancel(&state.db, &caller, id, expected_version).await?;
    Ok(Json(intervention.into()))
}

/// GET /api/interventions/:id/steps
pub async fn list_steps(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(_caller): Caller,
) -> ApiResult<Json<StepsResponse>> {
    let steps = service::list_steps(&state.db, id).await?;
    Ok(Json(StepsResponse { intervention_id: id, steps }))
}

/// GET /api/interventions/:id/audit
pub async fn audit_trail(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(_caller): Caller,
) -> ApiResult<Json<AuditResponse>> {
    let entries = service::audit_trail(&state.db, id).await?;
    Ok(Json(AuditResponse { intervention_id: id, entries }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn intervention_routes() -> Router<AppState> {
    Router::new()
        .route("/api/interventions", post(start_intervention))
        .route("/api/interventions/:id", get(get_intervention))
        .route("/api/interventions/:id/advance", post(advance_intervention))
        .route("/api/interventions/:id/cancel", post(cancel_intervention))
        .route("/api/interventions/:id/steps", get(list_steps))
        .route("/api/interventions/:id/audit", get(audit_trail))
}
