//! Advancement Authorizer
//!
//! Request-boundary checks in fixed order:
//! 1. identifier shape (`8-4-4-4-12` hex)
//! 2. bearer credential present and well-formed
//! 3. credential verified by the injected [`IdentityVerifier`]
//! 4. per-caller fixed-window rate counter ([`CounterStore`])
//!
//! The existence lookup and the state machine run after these, in the service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use ppfw_common::api::{parse_bearer, verify_token, CallerIdentity, CredentialError};
use ppfw_common::uuid_utils::is_uuid_like;

/// Establishes who is calling from a bearer token
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, CredentialError>;
}

/// Verifies `<subject>.<signature>` tokens against the database shared secret
pub struct SharedSecretVerifier {
    shared_secret: i64,
}

impl SharedSecretVerifier {
    pub fn new(shared_secret: i64) -> Self {
        Self { shared_secret }
    }
}

#[async_trait]
impl IdentityVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<CallerIdentity, CredentialError> {
        verify_token(token, self.shared_secret)
    }
}

/// Shared fixed-window counters
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` in the window starting at `window_start`
    /// (unix seconds) and return the new count
    async fn increment(&self, key: &str, window_start: i64) -> ppfw_common::Result<u32>;
}

/// Per-caller request allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// 0 disables limiting
    pub max_per_window: u32,
    pub window_secs: i64,
}

impl RateLimit {
    pub fn per_minute(max_per_window: u32) -> Self {
        Self { max_per_window, window_secs: 60 }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_per_window == 0 || self.window_secs <= 0
    }

    fn window_start(&self, now: DateTime<Utc>) -> i64 {
        let ts = now.timestamp();
        ts - ts.rem_euclid(self.window_secs)
    }
}

#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("Malformed intervention identifier: {0}")]
    MalformedIdentifier(String),

    #[error("{0}")]
    Credential(CredentialError),

    #[error("Rate limit exceeded; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error(transparent)]
    Storage(#[from] ppfw_common::Error),
}

/// Step 1: identifier shape
pub fn check_identifier(raw: &str) -> Result<Uuid, AuthorizeError> {
    if !is_uuid_like(raw) {
        return Err(AuthorizeError::MalformedIdentifier(raw.to_string()));
    }
    Uuid::parse_str(raw).map_err(|_| AuthorizeError::MalformedIdentifier(raw.to_string()))
}

/// Steps 2 and 3: credential presence, format and verification
pub async fn authenticate(
    authorization: Option<&str>,
    verifier: &dyn IdentityVerifier,
) -> Result<CallerIdentity, AuthorizeError> {
    let token = parse_bearer(authorization).map_err(AuthorizeError::Credential)?;
    verifier.verify(token).await.map_err(AuthorizeError::Credential)
}

/// Step 4: count this request against the caller's window
pub async fn check_rate(
    counters: &dyn CounterStore,
    scope: &str,
    caller: &CallerIdentity,
    limit: RateLimit,
    now: DateTime<Utc>,
) -> Result<(), AuthorizeError> {
    if limit.is_disabled() {
        return Ok(());
    }

    let window_start = limit.window_start(now);
    let key = format!("{}:{}", scope, caller.subject);
    let count = counters.increment(&key, window_start).await?;

    if count > limit.max_per_window {
        let retry_after_secs = (window_start + limit.window_secs - now.timestamp()).max(1);
        tracing::warn!(
            caller = %caller.subject,
            scope,
            count,
            limit = limit.max_per_window,
            "Rate limit exceeded"
        );
        return Err(AuthorizeError::RateLimited { retry_after_secs });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ppfw_common::api::issue_token;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct TestCounters(Mutex<HashMap<(String, i64), u32>>);

    #[async_trait]
    impl CounterStore for TestCounters {
        async fn increment(&self, key: &str, window_start: i64) -> ppfw_common::Result<u32> {
            let mut map = self.0.lock().unwrap();
            let count = map.entry((key.to_string(), window_start)).or_insert(0);
            *count += 1;
            Ok(*count)
        }
    }

    fn caller(subject: &str) -> CallerIdentity {
        CallerIdentity { subject: subject.to_string(), verified: true }
    }

    #[test]
    fn test_identifier_shape() {
        let id = Uuid::new_v4();
        assert_eq!(check_identifier(&id.to_string()).unwrap(), id);
        assert!(matches!(
            check_identifier("not-a-uuid"),
            Err(AuthorizeError::MalformedIdentifier(_))
        ));
        // Simple (unhyphenated) form is a valid UUID but not the accepted shape
        assert!(check_identifier(&id.simple().to_string()).is_err());
    }

    #[tokio::test]
    async fn test_authenticate_requires_present_well_formed_credential() {
        let verifier = SharedSecretVerifier::new(42);

        assert!(matches!(
            authenticate(None, &verifier).await,
            Err(AuthorizeError::Credential(CredentialError::Missing))
        ));
        assert!(matches!(
            authenticate(Some("Basic abc"), &verifier).await,
            Err(AuthorizeError::Credential(CredentialError::Malformed(_)))
        ));

        let good = format!("Bearer {}", issue_token("tech-1", 42));
        let identity = authenticate(Some(&good), &verifier).await.unwrap();
        assert_eq!(identity.subject, "tech-1");
        assert!(identity.verified);

        let forged = format!("Bearer {}", issue_token("tech-1", 43));
        assert!(matches!(
            authenticate(Some(&forged), &verifier).await,
            Err(AuthorizeError::Credential(CredentialError::InvalidSignature { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_per_caller_per_window() {
        let counters = TestCounters(Mutex::new(HashMap::new()));
        let limit = RateLimit::per_minute(2);
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 5).unwrap();

        check_rate(&counters, "advance", &caller("a"), limit, t0).await.unwrap();
        check_rate(&counters, "advance", &caller("a"), limit, t0).await.unwrap();
        let err = check_rate(&counters, "advance", &caller("a"), limit, t0).await.unwrap_err();
        assert!(matches!(err, AuthorizeError::RateLimited { retry_after_secs: 55 }));

        // Other callers and the next window are unaffected
        check_rate(&counters, "advance", &caller("b"), limit, t0).await.unwrap();
        let t1 = t0 + chrono::Duration::seconds(60);
        check_rate(&counters, "advance", &caller("a"), limit, t1).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_limit_disables_counting() {
        let counters = TestCounters(Mutex::new(HashMap::new()));
        for _ in 0..10 {
            check_rate(&counters, "advance", &caller("a"), RateLimit::per_minute(0), Utc::now())
                .await
                .unwrap();
        }
        assert!(counters.0.lock().unwrap().is_empty());
    }
}
