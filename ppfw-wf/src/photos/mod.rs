//! Photo Evidence Validator
//!
//! Upload is best effort: the only batch-level rejection is an empty file
//! set. Each file is paired by position with the angle/category/notes and
//! optional latitude/longitude fields. Metadata that is absent or outside
//! the vocabulary is replaced with a default, logged, and reported back.
//! Files are stored and deleted independently and concurrently; there is no
//! batch atomicity.

pub mod storage;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use ppfw_common::uuid_utils::is_uuid_like;

use crate::db;
use crate::models::{GpsPoint, PhotoAngle, PhotoCategory, PhotoEvidence, Stage};

pub use storage::{FsPhotoStore, PhotoStore};

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("No files in upload")]
    EmptyBatch,
}

/// One file part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw upload as received, before metadata is normalized
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub step_number: Option<String>,
    pub files: Vec<UploadFile>,
    pub angles: Vec<String>,
    pub categories: Vec<String>,
    pub notes: Vec<String>,
    pub latitudes: Vec<String>,
    pub longitudes: Vec<String>,
}

/// A default substituted for absent or unknown upload metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataFallback {
    /// Position of the file in the batch; `None` for batch-wide fields
    pub index: Option<usize>,
    pub field: &'static str,
    pub provided: Option<String>,
    pub applied: String,
}

/// File with normalized metadata, ready to store
#[derive(Debug, Clone)]
pub struct PreparedPhoto {
    pub index: usize,
    pub step_number: u8,
    pub angle: PhotoAngle,
    pub category: PhotoCategory,
    pub notes: Option<String>,
    pub gps: Option<GpsPoint>,
    pub file: UploadFile,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub index: usize,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub photos: Vec<PhotoEvidence>,
    pub failures: Vec<UploadFailure>,
    pub metadata_fallbacks: Vec<MetadataFallback>,
}

/// Per-identifier result of a bulk delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resolve angle and category for the file at `index`
pub fn normalize_metadata(
    index: usize,
    raw_angle: Option<&str>,
    raw_category: Option<&str>,
    fallbacks: &mut Vec<MetadataFallback>,
) -> (PhotoAngle, PhotoCategory) {
    let angle = match raw_angle.and_then(PhotoAngle::parse) {
        Some(angle) => angle,
        None => {
            warn!(
                index,
                provided = ?raw_angle,
                applied = PhotoAngle::DEFAULT.as_str(),
                "Photo angle missing or unknown, using default"
            );
            fallbacks.push(MetadataFallback {
                index: Some(index),
                field: "angle",
                provided: raw_angle.map(str::to_string),
                applied: PhotoAngle::DEFAULT.as_str().to_string(),
            });
            PhotoAngle::DEFAULT
        }
    };

    let category = match raw_category.and_then(PhotoCategory::parse) {
        Some(category) => category,
        None => {
            warn!(
                index,
                provided = ?raw_category,
                applied = PhotoCategory::DEFAULT.as_str(),
                "Photo category missing or unknown, using default"
            );
            fallbacks.push(MetadataFallback {
                index: Some(index),
                field: "category",
                provided: raw_category.map(str::to_string),
                applied: PhotoCategory::DEFAULT.as_str().to_string(),
            });
            PhotoCategory::DEFAULT
        }
    };

    (angle, category)
}

/// Both coordinates parsed and on the globe, otherwise no fix
pub fn parse_gps(latitude: Option<&str>, longitude: Option<&str>) -> Option<GpsPoint> {
    let latitude: f64 = latitude?.trim().parse().ok()?;
    let longitude: f64 = longitude?.trim().parse().ok()?;
    let on_globe = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
    on_globe.then_some(GpsPoint { latitude, longitude })
}

/// Pair files with their metadata
///
/// A missing or out-of-range `step_number` falls back to `default_step`
/// (the intervention's current stage) and is reported like any other
/// fallback.
pub fn prepare_batch(
    batch: UploadBatch,
    default_step: u8,
) -> Result<(Vec<PreparedPhoto>, Vec<MetadataFallback>), PhotoError> {
    if batch.files.is_empty() {
        return Err(PhotoError::EmptyBatch);
    }

    let mut fallbacks = Vec::new();

    let step_number = match batch
        .step_number
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(Stage::from_number)
    {
        Some(stage) => stage.number(),
        None => {
            warn!(
                provided = ?batch.step_number,
                applied = default_step,
                "Photo step number missing or invalid, using current stage"
            );
            fallbacks.push(MetadataFallback {
                index: None,
                field: "step_number",
                provided: batch.step_number.clone(),
                applied: default_step.to_string(),
            });
            default_step
        }
    };

    let prepared = batch
        .files
        .into_iter()
        .enumerate()
        .map(|(index, file)| {
            let (angle, category) = normalize_metadata(
                index,
                batch.angles.get(index).map(String::as_str),
                batch.categories.get(index).map(String::as_str),
                &mut fallbacks,
            );
            let notes = batch
                .notes
                .get(index)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            let gps = parse_gps(
                batch.latitudes.get(index).map(String::as_str),
                batch.longitudes.get(index).map(String::as_str),
            );
            PreparedPhoto { index, step_number, angle, category, notes, gps, file }
        })
        .collect();

    Ok((prepared, fallbacks))
}

/// Sniffed MIME type and file extension for stored bytes
pub fn detect_content_type(bytes: &[u8], declared: Option<&str>) -> (String, String) {
    if let Some(kind) = infer::get(bytes) {
        return (kind.mime_type().to_string(), kind.extension().to_string());
    }

    match declared.and_then(|ct| ct.strip_prefix("image/").map(|sub| (ct, sub))) {
        Some((ct, "jpeg")) => (ct.to_string(), "jpg".to_string()),
        Some((ct, sub)) if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => {
            (ct.to_string(), sub.to_string())
        }
        _ => ("application/octet-stream".to_string(), "bin".to_string()),
    }
}

/// Store every prepared photo concurrently and record the ones that landed
pub async fn ingest(
    pool: &SqlitePool,
    store: &dyn PhotoStore,
    intervention_id: Uuid,
    prepared: Vec<PreparedPhoto>,
    metadata_fallbacks: Vec<MetadataFallback>,
) -> UploadReport {
    let uploads = prepared
        .into_iter()
        .map(|photo| ingest_one(pool, store, intervention_id, photo));
    let results = join_all(uploads).await;

    let mut photos = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(photo) => photos.push(photo),
            Err(failure) => failures.push(failure),
        }
    }

    UploadReport { photos, failures, metadata_fallbacks }
}

async fn ingest_one(
    pool: &SqlitePool,
    store: &dyn PhotoStore,
    intervention_id: Uuid,
    photo: PreparedPhoto,
) -> Result<PhotoEvidence, UploadFailure> {
    let id = Uuid::new_v4();
    let (content_type, extension) =
        detect_content_type(&photo.file.bytes, photo.file.content_type.as_deref());

    let failure = |stage: &str, err: ppfw_common::Error| {
        error!(
            intervention_id = %intervention_id,
            index = photo.index,
            file_name = %photo.file.file_name,
            error = %err,
            "Photo {} failed",
            stage
        );
        UploadFailure {
            index: photo.index,
            file_name: photo.file.file_name.clone(),
            error: format!("{} failed", stage),
        }
    };

    let storage_key = store
        .put(intervention_id, id, &extension, &photo.file.bytes)
        .await
        .map_err(|e| failure("storage", e))?;

    let evidence = PhotoEvidence {
        id,
        intervention_id,
        step_number: photo.step_number,
        angle: photo.angle,
        category: photo.category,
        gps: photo.gps,
        quality_score: None,
        notes: photo.notes.clone(),
        file_name: photo.file.file_name.clone(),
        content_type,
        size_bytes: photo.file.bytes.len() as u64,
        storage_key,
        created_at: Utc::now(),
    };

    if let Err(e) = db::photos::insert(pool, &evidence).await {
        // Row never landed; drop the orphaned bytes
        if let Err(cleanup) = store.remove(&evidence.storage_key).await {
            warn!(storage_key = %evidence.storage_key, error = %cleanup, "Orphaned photo left in storage");
        }
        return Err(failure("record", e));
    }

    Ok(evidence)
}

/// Delete each identifier independently and report per-id outcomes
pub async fn delete_batch(
    pool: &SqlitePool,
    store: &dyn PhotoStore,
    intervention_id: Uuid,
    photo_ids: &[String],
) -> Vec<DeleteOutcome> {
    join_all(
        photo_ids
            .iter()
            .map(|raw| delete_one(pool, store, intervention_id, raw)),
    )
    .await
}

async fn delete_one(
    pool: &SqlitePool,
    store: &dyn PhotoStore,
    intervention_id: Uuid,
    raw_id: &str,
) -> DeleteOutcome {
    let outcome = |error: Option<&str>| DeleteOutcome {
        id: raw_id.to_string(),
        ok: error.is_none(),
        error: error.map(str::to_string),
    };

    let photo_id = match Uuid::parse_str(raw_id).ok().filter(|_| is_uuid_like(raw_id)) {
        Some(id) => id,
        None => return outcome(Some("malformed identifier")),
    };

    let photo = match db::photos::load_owned(pool, intervention_id, photo_id).await {
        Ok(Some(photo)) => photo,
        Ok(None) => return outcome(Some("not found")),
        Err(e) => {
            error!(photo_id = %photo_id, error = %e, "Photo lookup failed");
            return outcome(Some("internal error"));
        }
    };

    match db::photos::delete(pool, intervention_id, photo_id).await {
        Ok(true) => {}
        // Removed concurrently by another request
        Ok(false) => return outcome(Some("not found")),
        Err(e) => {
            error!(photo_id = %photo_id, error = %e, "Photo record removal failed");
            return outcome(Some("internal error"));
        }
    }

    // Row is gone; a failed byte removal is only logged
    if let Err(e) = store.remove(&photo.storage_key).await {
        warn!(photo_id = %photo_id, storage_key = %photo.storage_key, error = %e, "Orphaned photo left in storage");
    }

    outcome(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'],
        }
    }

    #[test]
    fn test_unknown_angle_falls_back_and_is_reported() {
        let mut fallbacks = Vec::new();
        let (angle, category) = normalize_metadata(0, Some("xyz"), Some("defect"), &mut fallbacks);

        assert_eq!(angle, PhotoAngle::FrontLeft);
        assert_eq!(category, PhotoCategory::Defect);
        assert_eq!(
            fallbacks,
            vec![MetadataFallback {
                index: Some(0),
                field: "angle",
                provided: Some("xyz".to_string()),
                applied: "front-left".to_string(),
            }]
        );
    }

    #[test]
    fn test_absent_metadata_uses_both_defaults() {
        let mut fallbacks = Vec::new();
        let (angle, category) = normalize_metadata(3, None, None, &mut fallbacks);
        assert_eq!(angle, PhotoAngle::DEFAULT);
        assert_eq!(category, PhotoCategory::InstallationProgress);
        assert_eq!(fallbacks.len(), 2);
        assert!(fallbacks.iter().all(|f| f.index == Some(3) && f.provided.is_none()));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            prepare_batch(UploadBatch::default(), 1),
            Err(PhotoError::EmptyBatch)
        ));
    }

    #[test]
    fn test_metadata_paired_by_position() {
        let batch = UploadBatch {
            step_number: Some("3".into()),
            files: vec![file("a.jpg"), file("b.jpg")],
            angles: vec!["rear".into(), "front".into()],
            categories: vec!["after-installation".into(), "defect".into()],
            notes: vec!["".into(), "scratch on bumper".into()],
            latitudes: vec!["45.5".into()],
            longitudes: vec!["-73.6".into()],
        };

        let (prepared, fallbacks) = prepare_batch(batch, 1).unwrap();
        assert!(fallbacks.is_empty());
        assert_eq!(prepared.len(), 2);
        assert!(prepared.iter().all(|p| p.step_number == 3));
        assert_eq!(prepared[0].angle, PhotoAngle::Rear);
        assert_eq!(prepared[0].notes, None);
        assert_eq!(prepared[0].gps, Some(GpsPoint { latitude: 45.5, longitude: -73.6 }));
        assert_eq!(prepared[1].category, PhotoCategory::Defect);
        assert_eq!(prepared[1].notes.as_deref(), Some("scratch on bumper"));
        assert_eq!(prepared[1].gps, None);
    }

    #[test]
    fn test_invalid_step_number_falls_back_to_current_stage() {
        let batch = UploadBatch {
            step_number: Some("9".into()),
            files: vec![file("a.jpg")],
            angles: vec!["front".into()],
            categories: vec!["defect".into()],
            ..Default::default()
        };

        let (prepared, fallbacks) = prepare_batch(batch, 2).unwrap();
        assert_eq!(prepared[0].step_number, 2);
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].field, "step_number");
        assert_eq!(fallbacks[0].index, None);
    }

    #[test]
    fn test_parse_gps_requires_both_coordinates_on_globe() {
        assert_eq!(
            parse_gps(Some(" 10.0 "), Some("20")),
            Some(GpsPoint { latitude: 10.0, longitude: 20.0 })
        );
        assert_eq!(parse_gps(Some("10"), None), None);
        assert_eq!(parse_gps(Some("91"), Some("0")), None);
        assert_eq!(parse_gps(Some("0"), Some("-181")), None);
        assert_eq!(parse_gps(Some("north"), Some("0")), None);
    }

    struct StuckStore;

    #[async_trait::async_trait]
    impl PhotoStore for StuckStore {
        async fn put(&self, _: Uuid, _: Uuid, _: &str, _: &[u8]) -> ppfw_common::Result<String> {
            Err(ppfw_common::Error::Internal("read-only".into()))
        }

        async fn remove(&self, _: &str) -> ppfw_common::Result<()> {
            Err(ppfw_common::Error::Internal("read-only".into()))
        }
    }

    #[tokio::test]
    async fn test_delete_removes_record_even_when_bytes_stay() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ppfw_common::db::init_schema(&pool).await.unwrap();
        let iv = crate::models::Intervention::new(None, None, None);
        db::interventions::insert(&pool, &iv).await.unwrap();

        let id = Uuid::new_v4();
        let photo = PhotoEvidence {
            id,
            intervention_id: iv.id,
            step_number: 1,
            angle: PhotoAngle::Front,
            category: PhotoCategory::BeforeInstallation,
            gps: None,
            quality_score: None,
            notes: None,
            file_name: "hood.jpg".into(),
            content_type: "image/jpeg".into(),
            size_bytes: 10,
            storage_key: format!("{}/{}.jpg", iv.id, id),
            created_at: Utc::now(),
        };
        db::photos::insert(&pool, &photo).await.unwrap();

        let outcomes = delete_batch(&pool, &StuckStore, iv.id, &[id.to_string()]).await;

        assert!(outcomes[0].ok, "{:?}", outcomes[0].error);
        assert!(db::photos::load_owned(&pool, iv.id, id).await.unwrap().is_none());
    }

    #[test]
    fn test_detect_content_type() {
        let jpeg = file("x").bytes;
        assert_eq!(
            detect_content_type(&jpeg, Some("text/plain")),
            ("image/jpeg".to_string(), "jpg".to_string())
        );
        assert_eq!(
            detect_content_type(b"????", Some("image/heic")),
            ("image/heic".to_string(), "heic".to_string())
        );
        assert_eq!(
            detect_content_type(b"????", None),
            ("application/octet-stream".to_string(), "bin".to_string())
        );
    }
}
