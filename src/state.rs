//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! carries the startup config and the two auth seams (credential verifier and
//! session store) as trait objects, so tests can swap in mocks.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::guard::RouteRules;
use crate::services::identity::{CredentialVerifier, GoogleOAuth};
use crate::services::session::SessionStore;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub oauth: GoogleOAuth,
    pub rules: Arc<RouteRules>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        oauth: GoogleOAuth,
    ) -> Self {
        Self { config: Arc::new(config), sessions, verifier, oauth, rules: Arc::new(RouteRules::default()) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
