//! Identity/database provider bootstrap
//!
//! Loads the service-account credentials that name the provider project and
//! constructs the database client handle. Both happen once at startup and
//! any failure here prevents the server from starting.

use std::path::Path;

use serde::Deserialize;

use crate::config::IdentitySection;
use crate::{Error, Result};

const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Service-account key file as issued by the provider.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl ServiceAccount {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|err| {
            Error::credentials(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let account: Self = serde_json::from_slice(raw)
            .map_err(|err| Error::credentials(format!("invalid credentials file: {}", err)))?;

        if account.project_id.trim().is_empty() {
            return Err(Error::credentials("credentials file has no project_id"));
        }

        Ok(account)
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

/// Provider project the server is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProject {
    pub project_id: String,
    pub client_email: Option<String>,
}

/// Resolve the provider project from explicit configuration or credentials.
pub fn resolve_project(config: &IdentitySection) -> Result<ProviderProject> {
    let account = match &config.credentials_path {
        Some(path) => Some(ServiceAccount::from_file(path)?),
        None => None,
    };

    let explicit = config
        .project_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let project_id = match (explicit, &account) {
        (Some(id), _) => id.to_string(),
        (None, Some(account)) => account.project_id.clone(),
        (None, None) => {
            return Err(Error::config(
                "no provider project: set identity.project_id or GOOGLE_APPLICATION_CREDENTIALS",
            ))
        }
    };

    Ok(ProviderProject {
        project_id,
        client_email: account
            .map(|a| a.client_email)
            .filter(|email| !email.is_empty()),
    })
}

/// Database client handle.
///
/// Held by the application context for the lifetime of the process. No route
/// reads or writes through it.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    project_id: String,
    documents_url: String,
}

impl FirestoreClient {
    pub fn new(project: &ProviderProject) -> Result<Self> {
        Self::with_endpoint(project, DEFAULT_FIRESTORE_ENDPOINT)
    }

    pub fn with_endpoint(project: &ProviderProject, endpoint: &str) -> Result<Self> {
        if project.project_id.contains('/') {
            return Err(Error::config(format!(
                "invalid project id: {}",
                project.project_id
            )));
        }

        let documents_url = format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            document_root(&project.project_id)
        );

        Ok(Self {
            project_id: project.project_id.clone(),
            documents_url,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn documents_url(&self) -> &str {
        &self.documents_url
    }
}

fn document_root(project_id: &str) -> String {
    format!("projects/{}/databases/(default)/documents", project_id)
}
