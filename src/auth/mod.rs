//! Bearer-token authentication
//!
//! The service never inspects tokens itself. A [`Credential`] is pulled from
//! the `Authorization` header and handed to an [`IdentityVerifier`], which
//! asks the identity provider whether it is valid. Every failure along the
//! way collapses into [`Unauthenticated`], so callers cannot tell a missing
//! header from an expired token or an unreachable provider.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use crate::api::AppState;
use crate::Result;

pub mod firebase;

pub use firebase::FirebaseVerifier;

/// Fixed message returned for every authentication failure.
pub const UNAUTHENTICATED_DETAIL: &str = "Not logged in or Invalid credentials";

/// Opaque bearer token taken from the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// Why no credential could be taken from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no Authorization header")]
    Missing,

    #[error("Authorization header is not a bearer credential")]
    Malformed,
}

/// Extract the bearer credential from request headers.
pub fn bearer_credential(headers: &HeaderMap) -> std::result::Result<Credential, CredentialError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(CredentialError::Missing)?
        .to_str()
        .map_err(|_| CredentialError::Malformed)?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().ok_or(CredentialError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(CredentialError::Malformed);
    }

    let token = parts.next().ok_or(CredentialError::Malformed)?;
    if parts.next().is_some() {
        return Err(CredentialError::Malformed);
    }

    Ok(Credential::new(token))
}

/// Claims about the caller as returned by the identity provider.
///
/// The record is owned by the provider; only the subject identifier is read
/// here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityRecord(Map<String, Value>);

impl IdentityRecord {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Stable subject identifier, if the record carries a non-empty one.
    pub fn uid(&self) -> Option<&str> {
        self.0
            .get("uid")
            .and_then(Value::as_str)
            .filter(|uid| !uid.is_empty())
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Server-side token verification performed by an external provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Ask the provider whether `credential` is valid and who it belongs to.
    async fn verify(&self, credential: &Credential) -> Result<IdentityRecord>;
}

/// The single user-facing error: HTTP 401 with a bearer challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{}", UNAUTHENTICATED_DETAIL)]
pub struct Unauthenticated;

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": UNAUTHENTICATED_DETAIL });
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
            Json(body),
        )
            .into_response()
    }
}

/// Verify the request's bearer credential, collapsing every failure.
///
/// The verifier is called at most once; there is no retry and no fallback
/// identity.
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> std::result::Result<IdentityRecord, Unauthenticated> {
    let credential = bearer_credential(headers).map_err(|err| {
        tracing::debug!(reason = %err, "Rejecting request without usable credential");
        Unauthenticated
    })?;

    let record = verifier.verify(&credential).await.map_err(|err| {
        tracing::debug!(error = %err, "Identity provider rejected credential");
        Unauthenticated
    })?;

    if record.uid().is_none() {
        tracing::warn!("Identity provider returned a record without a subject identifier");
        return Err(Unauthenticated);
    }

    Ok(record)
}

/// Extractor yielding the caller's verified identity.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity(pub IdentityRecord);

impl VerifiedIdentity {
    pub fn uid(&self) -> &str {
        // authenticate() refuses records without a uid
        self.0.uid().unwrap_or_default()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for VerifiedIdentity {
    type Rejection = Unauthenticated;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        authenticate(state.verifier().as_ref(), &parts.headers)
            .await
            .map(VerifiedIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    struct CountingVerifier {
        calls: AtomicUsize,
        result: fn() -> Result<IdentityRecord>,
    }

    #[async_trait]
    impl IdentityVerifier for CountingVerifier {
        async fn verify(&self, _credential: &Credential) -> Result<IdentityRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn record_with_uid(uid: &str) -> IdentityRecord {
        let mut claims = Map::new();
        claims.insert("uid".to_string(), Value::String(uid.to_string()));
        IdentityRecord::new(claims)
    }

    #[test]
    fn test_bearer_credential() {
        let credential = bearer_credential(&headers_with("Bearer abc.def.ghi")).unwrap();
        assert_eq!(credential.as_str(), "abc.def.ghi");

        // Scheme is case-insensitive
        let credential = bearer_credential(&headers_with("bearer tok")).unwrap();
        assert_eq!(credential.as_str(), "tok");
    }

    #[test]
    fn test_bearer_credential_rejections() {
        assert_eq!(
            bearer_credential(&HeaderMap::new()),
            Err(CredentialError::Missing)
        );
        assert_eq!(
            bearer_credential(&headers_with("Basic dXNlcjpwYXNz")),
            Err(CredentialError::Malformed)
        );
        assert_eq!(
            bearer_credential(&headers_with("Bearer")),
            Err(CredentialError::Malformed)
        );
        assert_eq!(
            bearer_credential(&headers_with("Bearer a b")),
            Err(CredentialError::Malformed)
        );
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        assert!(!format!("{:?}", credential).contains("secret-token"));
    }

    #[test]
    fn test_identity_record_uid() {
        assert_eq!(record_with_uid("abc123").uid(), Some("abc123"));
        assert_eq!(record_with_uid("").uid(), None);
        assert_eq!(IdentityRecord::default().uid(), None);

        let mut claims = Map::new();
        claims.insert("uid".to_string(), Value::from(42));
        assert_eq!(IdentityRecord::new(claims).uid(), None);
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let verifier = CountingVerifier {
            calls: AtomicUsize::new(0),
            result: || Ok(record_with_uid("abc123")),
        };

        let record = authenticate(&verifier, &headers_with("Bearer good"))
            .await
            .unwrap();
        assert_eq!(record.uid(), Some("abc123"));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticate_missing_header_skips_provider() {
        let verifier = CountingVerifier {
            calls: AtomicUsize::new(0),
            result: || Ok(record_with_uid("abc123")),
        };

        let result = authenticate(&verifier, &HeaderMap::new()).await;
        assert_eq!(result.unwrap_err(), Unauthenticated);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authenticate_provider_failure_is_not_retried() {
        let verifier = CountingVerifier {
            calls: AtomicUsize::new(0),
            result: || Err(Error::provider("TOKEN_EXPIRED")),
        };

        let result = authenticate(&verifier, &headers_with("Bearer expired")).await;
        assert_eq!(result.unwrap_err(), Unauthenticated);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_record_without_uid() {
        let verifier = CountingVerifier {
            calls: AtomicUsize::new(0),
            result: || Ok(IdentityRecord::default()),
        };

        let result = authenticate(&verifier, &headers_with("Bearer odd")).await;
        assert_eq!(result.unwrap_err(), Unauthenticated);
    }

    #[test]
    fn test_unauthenticated_response() {
        let response = Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
