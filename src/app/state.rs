//! Application state management.

use std::sync::Arc;

use crate::infra::HttpSignatureVerifier;

use super::service::AppService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AppService>,
    /// Verifier for explorer notifications. `None` accepts unsigned notifications.
    pub signature_verifier: Option<Arc<HttpSignatureVerifier>>,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<AppService>) -> Self {
        Self {
            service,
            signature_verifier: None,
        }
    }

    /// Require explorer notifications to carry a valid signature (builder pattern)
    #[must_use]
    pub fn with_signature_verifier(mut self, verifier: Arc<HttpSignatureVerifier>) -> Self {
        self.signature_verifier = Some(verifier);
        self
    }
}
