//! ppfw-wf - PPF intervention workflow service
//!
//! Stage advancement for paint-protection-film installation jobs, compliance
//! scoring and photo evidence over a shared SQLite database.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod photos;
pub mod validators;
pub mod workflow;

use config::{DEFAULT_ADVANCE_RATE_LIMIT, DEFAULT_MAX_UPLOAD_BYTES};
use db::SqliteCounterStore;
use photos::{FsPhotoStore, PhotoStore};
use validators::ComplianceScorer;
use workflow::{CounterStore, IdentityVerifier, RateLimit, SharedSecretVerifier};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub counters: Arc<dyn CounterStore>,
    pub photo_store: Arc<dyn PhotoStore>,
    pub scorer: ComplianceScorer,
    pub advance_limit: RateLimit,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// State with the shipped collaborators and default limits
    pub fn new(db: SqlitePool, shared_secret: i64, photo_dir: PathBuf) -> Self {
        Self {
            verifier: Arc::new(SharedSecretVerifier::new(shared_secret)),
            counters: Arc::new(SqliteCounterStore::new(db.clone())),
            photo_store: Arc::new(FsPhotoStore::new(photo_dir)),
            scorer: ComplianceScorer::default(),
            advance_limit: RateLimit::per_minute(DEFAULT_ADVANCE_RATE_LIMIT),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            db,
        }
    }

    pub fn with_advance_rate_limit(mut self, per_minute: u32) -> Self {
        self.advance_limit = RateLimit::per_minute(per_minute);
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// Build application router
///
/// `/health` is public; every `/api` route authenticates inside its
/// extractors so the identifier shape is checked before the credential.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(api::intervention_routes())
        .merge(api::validation_routes())
        .merge(api::photo_routes())
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .merge(api_routes)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
