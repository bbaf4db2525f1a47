//! HTTP error boundary
//!
//! Every failure leaves the service as
//! `{"error": {"code": "...", "message": "...", "details": [...]}}`.
//! Internal faults are logged in full and answered with a generic message.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use ppfw_common::api::CredentialError;

use crate::models::FieldIssue;
use crate::photos::PhotoError;
use crate::workflow::authorizer::AuthorizeError;
use crate::workflow::WorkflowError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// 401
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// 409
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 415
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// 422 with a stable code and optional itemized details
    #[error("{message}")]
    UnprocessableStep {
        code: &'static str,
        message: String,
        details: Vec<FieldIssue>,
    },

    /// 429
    #[error("Rate limited")]
    RateLimited { retry_after_secs: i64 },

    /// 500; the message is never sent to the client
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::MalformedInput(msg) => (StatusCode::BAD_REQUEST, "MALFORMED_INPUT", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::UnsupportedEncoding(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_ENCODING",
                msg,
                None,
            ),
            ApiError::UnprocessableStep { code, message, details } => {
                let details = (!details.is_empty()).then(|| json!(details));
                (StatusCode::UNPROCESSABLE_ENTITY, code, message, details)
            }
            ApiError::RateLimited { retry_after_secs } => {
                let body = error_body(
                    "RATE_LIMITED",
                    format!("Too many requests; retry in {}s", retry_after_secs),
                    None,
                );
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (status, error_body(code, message, details)).into_response()
    }
}

fn error_body(code: &str, message: String, details: Option<Value>) -> Json<Value> {
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let (Some(details), Some(obj)) = (details, error.as_object_mut()) {
        obj.insert("details".to_string(), details);
    }
    Json(json!({ "error": error }))
}

impl From<ppfw_common::Error> for ApiError {
    fn from(err: ppfw_common::Error) -> Self {
        match err {
            ppfw_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            ppfw_common::Error::InvalidInput(msg) => ApiError::MalformedInput(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::DatabaseError(msg) => ApiError::Internal(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AuthorizeError> for ApiError {
    fn from(err: AuthorizeError) -> Self {
        match err {
            AuthorizeError::MalformedIdentifier(raw) => {
                ApiError::MalformedInput(format!("Invalid intervention identifier: {}", raw))
            }
            AuthorizeError::Credential(e) => e.into(),
            AuthorizeError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs }
            }
            AuthorizeError::Storage(e) => e.into(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::NotFound(_) => ApiError::NotFound(message),
            WorkflowError::InvalidStep(_) => ApiError::UnprocessableStep {
                code: "INVALID_STEP",
                message,
                details: Vec::new(),
            },
            WorkflowError::OutOfOrder { .. } => ApiError::UnprocessableStep {
                code: "STEP_OUT_OF_ORDER",
                message,
                details: Vec::new(),
            },
            WorkflowError::Finalized(_) => ApiError::UnprocessableStep {
                code: "INTERVENTION_FINALIZED",
                message,
                details: Vec::new(),
            },
            WorkflowError::ValidationFailed(issues) => ApiError::UnprocessableStep {
                code: "VALIDATION_FAILED",
                message,
                details: issues,
            },
            WorkflowError::Conflict { .. } => ApiError::Conflict(message),
            WorkflowError::Storage(e) => e.into(),
        }
    }
}

impl From<PhotoError> for ApiError {
    fn from(err: PhotoError) -> Self {
        match err {
            PhotoError::EmptyBatch => ApiError::MalformedInput(err.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
