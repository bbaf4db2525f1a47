//! Photo evidence handlers
//!
//! POST /api/interventions/:id/photos (multipart),
//! GET /api/interventions/:id/photos?step=N,
//! DELETE /api/interventions/:id/photos with `{photo_ids: [...]}`

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{optional_object, Caller, InterventionPath};
use crate::error::{ApiError, ApiResult};
use crate::models::{PhotoEvidence, Stage};
use crate::photos::{self, DeleteOutcome, UploadBatch, UploadFile, UploadReport};
use crate::workflow::service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub step: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub intervention_id: Uuid,
    pub photos: Vec<PhotoEvidence>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub intervention_id: Uuid,
    pub deleted: usize,
    pub results: Vec<DeleteOutcome>,
}

/// POST /api/interventions/:id/photos
///
/// Files are paired by position with `angle`, `category`, `notes`,
/// `latitude` and `longitude` fields; `step_number` applies to the batch.
pub async fn upload_photos(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(caller): Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<UploadReport>)> {
    let multipart =
        multipart.map_err(|e| ApiError::UnsupportedEncoding(e.body_text()))?;

    let intervention = service::load(&state.db, id).await?;
    let batch = read_batch(multipart).await?;
    let (prepared, fallbacks) = photos::prepare_batch(batch, intervention.current_step)?;
    let submitted = prepared.len();

    let report =
        photos::ingest(&state.db, state.photo_store.as_ref(), id, prepared, fallbacks).await;

    if report.photos.is_empty() {
        return Err(ApiError::Internal(format!(
            "All {} photo(s) failed to store for intervention {}",
            submitted, id
        )));
    }

    tracing::info!(
        intervention_id = %id,
        caller = %caller.subject,
        stored = report.photos.len(),
        failed = report.failures.len(),
        fallbacks = report.metadata_fallbacks.len(),
        "Photos uploaded"
    );

    Ok((StatusCode::CREATED, Json(report)))
}

async fn read_batch(mut multipart: Multipart) -> ApiResult<UploadBatch> {
    let mut batch = UploadBatch::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedInput(e.body_text()))?
    {
        let name = field
            .name()
            .unwrap_or_default()
            .trim_end_matches("[]")
            .to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::MalformedInput(e.body_text()))?;
            // Zero-length parts are what browsers send for an empty file input
            if !bytes.is_empty() {
                batch.files.push(UploadFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::MalformedInput(e.body_text()))?;

        match name.as_str() {
            "angle" | "angles" => batch.angles.push(text),
            "category" | "categories" => batch.categories.push(text),
            "note" | "notes" => batch.notes.push(text),
            "latitude" | "latitudes" => batch.latitudes.push(text),
            "longitude" | "longitudes" => batch.longitudes.push(text),
            "step_number" | "stepNumber" | "step" => batch.step_number = Some(text),
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(batch)
}

/// GET /api/interventions/:id/photos
pub async fn list_photos(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(_caller): Caller,
    Query(query): Query<PhotoQuery>,
) -> ApiResult<Json<PhotoListResponse>> {
    let step = match query.step.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => {
            let stage = raw
                .parse::<i64>()
                .ok()
                .and_then(Stage::from_number)
                .ok_or_else(|| {
                    ApiError::MalformedInput(format!("step must be an integer 1-4, got {}", raw))
                })?;
            Some(stage.number())
        }
    };

    service::load(&state.db, id).await?;
    let photos = crate::db::photos::list_for_intervention(&state.db, id, step).await?;

    Ok(Json(PhotoListResponse { intervention_id: id, photos }))
}

/// DELETE /api/interventions/:id/photos
///
/// Each identifier succeeds or fails on its own.
pub async fn delete_photos(
    State(state): State<AppState>,
    InterventionPath(id): InterventionPath,
    Caller(caller): Caller,
    body: Bytes,
) -> ApiResult<Json<DeleteResponse>> {
    let body = optional_object(&body)?;
    let photo_ids = match body.get("photo_ids") {
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ApiError::MalformedInput("photo_ids must be strings".to_string()))?,
        _ => {
            return Err(ApiError::MalformedInput(
                "photo_ids must be a non-empty array".to_string(),
            ))
        }
    };

    service::load(&state.db, id).await?;
    let results =
        photos::delete_batch(&state.db, state.photo_store.as_ref(), id, &photo_ids).await;
    let deleted = results.iter().filter(|r| r.ok).count();

    tracing::info!(
        intervention_id = %id,
        caller = %caller.subject,
        requested = photo_ids.len(),
        deleted,
        "Photo deletion processed"
    );

    Ok(Json(DeleteResponse { intervention_id: id, deleted, results }))
}

pub fn photo_routes() -> Router<AppState> {
    Router::new().route(
        "/api/interventions/:id/photos",
        post(upload_photos).get(list_photos).delete(delete_photos),
    )
}
