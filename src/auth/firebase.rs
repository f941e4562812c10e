//! Identity verification against the provider's account-lookup REST call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Credential, IdentityRecord, IdentityVerifier};
use crate::config::IdentitySection;
use crate::{Error, Result};

const LOOKUP_PATH: &str = "/v1/accounts:lookup";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Verifies ID tokens by asking the identity provider to resolve them.
///
/// One network round trip per call; nothing is cached locally and no
/// signature checking happens in-process.
#[derive(Clone)]
pub struct FirebaseVerifier {
    http: reqwest::Client,
    lookup_url: String,
    api_key: String,
}

impl FirebaseVerifier {
    pub fn new(http: reqwest::Client, endpoint: &str, api_key: impl Into<String>) -> Self {
        Self {
            http,
            lookup_url: format!("{}{}", endpoint.trim_end_matches('/'), LOOKUP_PATH),
            api_key: api_key.into(),
        }
    }

    /// Build a verifier with its own HTTP client from configuration.
    pub fn from_config(config: &IdentitySection) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self::new(http, &config.endpoint, config.api_key.clone()))
    }

    pub fn lookup_url(&self) -> &str {
        &self.lookup_url
    }
}

impl std::fmt::Debug for FirebaseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseVerifier")
            .field("lookup_url", &self.lookup_url)
            .finish_non_exhaustive()
    }
}

/// Shared HTTP client for calls to the provider.
pub fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(Error::from)
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, credential: &Credential) -> Result<IdentityRecord> {
        let response = self
            .http
            .post(&self.lookup_url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&serde_json::json!({ "idToken": credential.as_str() }))
            .send()
            .await
            .map_err(|err| {
                let err = err.without_url();
                tracing::warn!(error = %err, "Identity provider unreachable");
                Error::from(err)
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::from(err.without_url()))?;

        if !status.is_success() {
            let reason = serde_json::from_slice::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(Error::provider(format!(
                "token lookup failed ({}): {}",
                status.as_u16(),
                reason
            )));
        }

        let lookup: LookupResponse = serde_json::from_slice(&body)?;
        let mut users = lookup.users.into_iter();
        let user = match (users.next(), users.next()) {
            (Some(user), None) => user,
            (None, _) => return Err(Error::provider("token resolved to no account")),
            (Some(_), Some(_)) => return Err(Error::provider("token resolved to several accounts")),
        };

        Ok(user_to_record(user))
    }
}

/// Expose the provider's `localId` as `uid`, keeping every other field.
fn user_to_record(mut user: Map<String, Value>) -> IdentityRecord {
    if let Some(local_id) = user.get("localId").cloned() {
        user.insert("uid".to_string(), local_id);
    }
    IdentityRecord::new(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_to_record() {
        let user = json!({
            "localId": "abc123",
            "email": "user@example.com",
            "emailVerified": true
        });
        let record = user_to_record(user.as_object().unwrap().clone());

        assert_eq!(record.uid(), Some("abc123"));
        assert_eq!(record.claims()["email"], "user@example.com");
        assert_eq!(record.claims()["localId"], "abc123");
    }

    #[test]
    fn test_user_without_local_id_has_no_uid() {
        let user = json!({ "email": "user@example.com" });
        let record = user_to_record(user.as_object().unwrap().clone());
        assert_eq!(record.uid(), None);
    }

    #[test]
    fn test_lookup_url() {
        let http = reqwest::Client::new();
        let verifier = FirebaseVerifier::new(http, "http://127.0.0.1:9099/", "secret-api-key");
        assert_eq!(verifier.lookup_url(), "http://127.0.0.1:9099/v1/accounts:lookup");
        assert!(!format!("{:?}", verifier).contains("secret-api-key"));
    }
}
