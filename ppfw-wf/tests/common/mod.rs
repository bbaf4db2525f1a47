//! Shared helpers for ppfw-wf integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use ppfw_common::api::issue_token;
use ppfw_wf::{build_router, AppState};

pub const SECRET: i64 = 7_340_021;

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub dir: TempDir,
}

impl TestApp {
    pub fn photo_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("photos")
    }
}

/// Fresh file-backed database with rate limiting disabled
pub async fn setup() -> TestApp {
    setup_with(|state| state.with_advance_rate_limit(0)).await
}

pub async fn setup_with(configure: impl FnOnce(AppState) -> AppState) -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = ppfw_common::db::init_database(&dir.path().join("ppfw.db"))
        .await
        .unwrap();
    let state = configure(AppState::new(pool.clone(), SECRET, dir.path().join("photos")));

    TestApp {
        router: build_router(state),
        pool,
        dir,
    }
}

pub fn bearer(subject: &str) -> String {
    format!("Bearer {}", issue_token(subject, SECRET))
}

pub fn json_request(method: &str, uri: &str, subject: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(subject) = subject {
        builder = builder.header(header::AUTHORIZATION, bearer(subject));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, subject: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(subject) = subject {
        builder = builder.header(header::AUTHORIZATION, bearer(subject));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

/// Start an intervention and return its id
pub async fn start_intervention(router: &Router) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/interventions",
            Some("tech-1"),
            serde_json::json!({
                "client_id": "client-7",
                "vehicle_id": "vin-WVW123",
                "technician_id": "tech-1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

pub async fn advance(router: &Router, id: &str, body: Value) -> (StatusCode, Value) {
    send(
        router,
        json_request(
            "POST",
            &format!("/api/interventions/{}/advance", id),
            Some("tech-1"),
            body,
        ),
    )
    .await
}
