//! Identity provider seam.
//!
//! DESIGN
//! ======
//! The provider owns the interactive OAuth flow and the client-side identity.
//! It publishes identity changes on a `watch` channel; the auth controller
//! consumes them through `IdentityListener` and nowhere else.

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::HandoffError;

/// Scopes requested at sign-in: calendar read/write plus basic profile and email.
pub const SIGN_IN_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
    "openid",
    "email",
    "profile",
];

/// Signed-in user as reported by the provider and by `/api/auth/me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Result of an interactive sign-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityCredential {
    /// Short-lived ID token handed to `POST /api/auth/session`.
    pub id_token: String,
    pub user: User,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive sign-in flow.
    ///
    /// # Errors
    ///
    /// Returns `HandoffError::Provider` if the user cancels or the provider fails.
    async fn sign_in(&self, scopes: &[&str]) -> Result<IdentityCredential, HandoffError>;

    /// Drop the provider-side identity.
    ///
    /// # Errors
    ///
    /// Returns `HandoffError::Provider` if the provider fails.
    async fn sign_out(&self) -> Result<(), HandoffError>;

    /// Identity as currently known to the provider.
    fn current_user(&self) -> Option<User>;

    /// Receiver for identity changes.
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Provider that hands out a preconfigured credential.
///
/// Used by headless shells and integration harnesses where no browser popup
/// is available. `None` makes every sign-in fail as if the user cancelled.
pub struct StaticIdentityProvider {
    credential: Option<IdentityCredential>,
    identity: watch::Sender<Option<User>>,
}

impl StaticIdentityProvider {
    #[must_use]
    pub fn new(credential: Option<IdentityCredential>) -> Self {
        let (identity, _) = watch::channel(None);
        Self { credential, identity }
    }

    /// Replace the identity from outside a sign-in, e.g. a session revoked elsewhere.
    pub fn set_identity(&self, user: Option<User>) {
        self.identity.send_replace(user);
    }
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn sign_in(&self, scopes: &[&str]) -> Result<IdentityCredential, HandoffError> {
        let Some(credential) = self.credential.clone() else {
            return Err(HandoffError::Provider("sign-in cancelled".into()));
        };
        tracing::debug!(scopes = scopes.len(), email = %credential.user.email, "provider sign-in");
        self.identity.send_replace(Some(credential.user.clone()));
        Ok(credential)
    }

    async fn sign_out(&self) -> Result<(), HandoffError> {
        self.identity.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.identity.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.identity.subscribe()
    }
}
