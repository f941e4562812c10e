//! Application context shared by all handlers

use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::config::Settings;
use crate::provider::FirestoreClient;

/// API server state
///
/// Built once at startup; every field is read-only afterwards, so clones are
/// cheap handle copies that can be used concurrently.
#[derive(Clone)]
pub struct AppState {
    /// Resolved process settings
    settings: Arc<Settings>,

    /// Verifies bearer credentials with the identity provider
    verifier: Arc<dyn IdentityVerifier>,

    /// Database client handle (unused by routes)
    firestore: Option<Arc<FirestoreClient>>,
}

impl AppState {
    pub fn new(settings: Settings, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            settings: Arc::new(settings),
            verifier,
            firestore: None,
        }
    }

    /// Attach the database client handle
    pub fn with_firestore(mut self, client: FirestoreClient) -> Self {
        self.firestore = Some(Arc::new(client));
        self
    }

    /// Settings resolved at startup. Always the same instance.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn verifier(&self) -> &Arc<dyn IdentityVerifier> {
        &self.verifier
    }

    pub fn firestore(&self) -> Option<&Arc<FirestoreClient>> {
        self.firestore.as_ref()
    }
}
