//! Request extractors for the Advancement Authorizer checks
//!
//! Handlers take [`InterventionPath`] before [`Caller`], so a malformed
//! identifier is rejected before the credential is looked at.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use ppfw_common::api::{CallerIdentity, CredentialError};

use crate::error::ApiError;
use crate::workflow::authorizer::{authenticate, check_identifier, AuthorizeError};
use crate::AppState;

/// `:id` path segment with the UUID shape enforced
#[derive(Debug, Clone, Copy)]
pub struct InterventionPath(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for InterventionPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::MalformedInput(e.body_text()))?;

        Ok(InterventionPath(check_identifier(&raw)?))
    }
}

/// Verified caller from the `Authorization` header
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| {
                AuthorizeError::Credential(CredentialError::Malformed(
                    "Authorization header is not printable ASCII".to_string(),
                ))
            })?),
        };

        let identity = authenticate(header, state.verifier.as_ref()).await;
        match identity {
            Ok(identity) => Ok(Caller(identity)),
            Err(e) => {
                tracing::debug!(path = %parts.uri.path(), error = %e, "Credential rejected");
                Err(e.into())
            }
        }
    }
}
