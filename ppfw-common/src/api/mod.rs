//! Shared HTTP API functionality
//!
//! Contains ONLY framework-independent pieces: credential parsing, token
//! signing/verification and shared-secret persistence. Each service wraps
//! these with its own axum extractors.

pub mod auth;

pub use auth::{
    issue_token, parse_bearer, verify_token, CallerIdentity, CredentialError,
    AUTH_DISABLED_SECRET,
};
#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
