//! Bearer credential parsing and signed-token verification
//!
//! # Token format
//!
//! `Authorization: Bearer <subject>.<signature>`
//!
//! - `subject`: caller identity (technician id, e-mail, service name)
//! - `signature`: SHA-256 of `subject` followed by the shared secret as a
//!   decimal i64 string, rendered as 64 lowercase hex characters
//!
//! The shared secret lives in the database `settings` table under
//! `api_shared_secret`. The special value 0 disables signature checking; the
//! credential must still be present and well-formed.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Shared secret value that disables signature verification
pub const AUTH_DISABLED_SECRET: i64 = 0;

const BEARER_PREFIX: &str = "Bearer ";
const MAX_TOKEN_LEN: usize = 512;

// ========================================
// Error Types
// ========================================

/// Credential error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No Authorization header
    Missing,

    /// Header present but not `Bearer <token>` with a printable token
    Malformed(String),

    /// Signature does not match the shared secret
    InvalidSignature { subject: String },

    /// Failed to load or store the shared secret
    DatabaseError(String),
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Missing => write!(f, "Missing bearer credential"),
            CredentialError::Malformed(reason) => write!(f, "Malformed credential: {}", reason),
            CredentialError::InvalidSignature { .. } => write!(f, "Invalid credential signature"),
            CredentialError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Identity established from a verified credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    pub subject: String,
    /// False when the secret is disabled and only the format was checked
    pub verified: bool,
}

// ========================================
// Parsing
// ========================================

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use ppfw_common::api::auth::{parse_bearer, CredentialError};
///
/// assert_eq!(parse_bearer(Some("Bearer abc.def")), Ok("abc.def"));
/// assert_eq!(parse_bearer(None), Err(CredentialError::Missing));
/// assert!(parse_bearer(Some("Basic dXNlcg==")).is_err());
/// ```
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, CredentialError> {
    let value = header_value.ok_or(CredentialError::Missing)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| CredentialError::Malformed("expected Bearer scheme".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(CredentialError::Malformed("empty token".to_string()));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(CredentialError::Malformed(format!(
            "token longer than {} characters",
            MAX_TOKEN_LEN
        )));
    }
    if !token.chars().all(|c| c.is_ascii_graphic()) {
        return Err(CredentialError::Malformed(
            "token contains non-printable characters".to_string(),
        ));
    }

    Ok(token)
}

// ========================================
// Signing and Verification
// ========================================

/// Compute the signature for `subject`
fn signature(subject: &str, shared_secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the full bearer token `<subject>.<signature>` for `subject`
///
/// # Examples
///
/// ```
/// use ppfw_common::api::auth::{issue_token, verify_token};
///
/// let token = issue_token("tech-42", 123456789);
/// let caller = verify_token(&token, 123456789).unwrap();
/// assert_eq!(caller.subject, "tech-42");
/// assert!(verify_token(&token, 987654321).is_err());
/// ```
pub fn issue_token(subject: &str, shared_secret: i64) -> String {
    format!("{}.{}", subject, signature(subject, shared_secret))
}

/// Verify a token and return the caller identity
pub fn verify_token(token: &str, shared_secret: i64) -> Result<CallerIdentity, CredentialError> {
    let (subject, provided) = match token.rsplit_once('.') {
        Some((subject, sig)) => (subject, Some(sig)),
        None => (token, None),
    };

    if subject.is_empty() {
        return Err(CredentialError::Malformed("empty subject".to_string()));
    }

    if shared_secret == AUTH_DISABLED_SECRET {
        return Ok(CallerIdentity {
            subject: subject.to_string(),
            verified: false,
        });
    }

    let provided = provided
        .ok_or_else(|| CredentialError::Malformed("missing signature".to_string()))?;

    if provided != signature(subject, shared_secret) {
        return Err(CredentialError::InvalidSignature {
            subject: subject.to_string(),
        });
    }

    Ok(CallerIdentity {
        subject: subject.to_string(),
        verified: true,
    })
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings, generating one if absent
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, CredentialError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| CredentialError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero shared secret
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, CredentialError> {
    use rand::Rng;

    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != AUTH_DISABLED_SECRET {
                break val;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| CredentialError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Tests
// ========================================
