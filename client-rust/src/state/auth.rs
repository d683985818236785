//! Sign-in state machine.
//!
//! DESIGN
//! ======
//! `AuthController` owns the client's auth phase:
//!
//! ```text
//! SignedOut --sign_in ok--> SignedIn --sign_out--> SignedOut
//!     \__ Pending(SignIn) __/   \__ Pending(SignOut) __/
//! ```
//!
//! One latch covers both directions. While a sign-in or sign-out is in
//! flight every further trigger returns `Outcome::Busy`. The latch is held
//! by an RAII guard so it clears on every exit path.
//!
//! Outside those two flows the phase only changes through
//! `apply_identity`, fed by `IdentityListener` from the provider's
//! subscription, and `resume_session`, fed by a server-confirmed session.
//! A provider identity alone never moves the client to `SignedIn`.
//!
//! ERROR HANDLING
//! ==============
//! Flow errors stop at the controller. They are logged and reported in the
//! returned `Outcome`; nothing is retried. Sign-out is best-effort: provider
//! and session-deletion failures are logged and the client still lands on `/`.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::HandoffError;
use crate::identity::{IdentityProvider, SIGN_IN_SCOPES, User};
use crate::nav::{DASHBOARD_PATH, Navigator, ROOT_PATH};
use crate::net::api::SessionEndpoint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    SignedOut,
    Pending(AuthAction),
    SignedIn(User),
}

impl AuthPhase {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// What a trigger did.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// Sign-in stopped; the phase was restored and no navigation happened.
    Failed(HandoffError),
    /// Another sign-in or sign-out was already in flight.
    Busy,
}

/// Holds the single-flight latch until dropped.
struct PendingLatch<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PendingLatch<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PendingLatch<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct AuthController {
    phase: watch::Sender<AuthPhase>,
    latch: AtomicBool,
    provider: Arc<dyn IdentityProvider>,
    session: Arc<dyn SessionEndpoint>,
    navigator: Arc<dyn Navigator>,
}

impl AuthController {
    /// Start in `SignedOut`. A provider identity left over from an earlier
    /// visit does not count; use [`AuthController::resume_session`] once the
    /// server confirms the session.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        session: Arc<dyn SessionEndpoint>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (phase, _) = watch::channel(AuthPhase::SignedOut);
        Self { phase, latch: AtomicBool::new(false), provider, session, navigator }
    }

    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        self.phase.borrow().clone()
    }

    /// Receiver for phase changes, e.g. to disable the sign-in control.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthPhase> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.latch.load(Ordering::Acquire)
    }

    /// Sign in with the provider and trade the credential for a session cookie.
    ///
    /// Navigates to the dashboard only on a 2xx from the session endpoint.
    pub async fn sign_in(&self) -> Outcome {
        let Some(_latch) = PendingLatch::try_acquire(&self.latch) else {
            tracing::debug!("sign-in ignored: hand-off in flight");
            return Outcome::Busy;
        };
        let previous = self.phase.send_replace(AuthPhase::Pending(AuthAction::SignIn));

        match self.exchange_credential().await {
            Ok(user) => {
                tracing::info!(email = %user.email, "signed in");
                self.phase.send_replace(AuthPhase::SignedIn(user));
                self.navigator.push(DASHBOARD_PATH);
                Outcome::Completed
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                self.phase.send_replace(previous);
                Outcome::Failed(e)
            }
        }
    }

    async fn exchange_credential(&self) -> Result<User, HandoffError> {
        let credential = self.provider.sign_in(SIGN_IN_SCOPES).await?;
        let status = self.session.create_session(&credential.id_token).await?;
        if !status.is_success() {
            return Err(HandoffError::Status(status));
        }
        Ok(credential.user)
    }

    /// Sign out of the provider, drop the server session and go to `/`.
    pub async fn sign_out(&self) -> Outcome {
        let Some(_latch) = PendingLatch::try_acquire(&self.latch) else {
            tracing::debug!("sign-out ignored: hand-off in flight");
            return Outcome::Busy;
        };
        self.phase.send_replace(AuthPhase::Pending(AuthAction::SignOut));

        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "provider sign-out failed");
        }
        match self.session.delete_session().await {
            Ok(status) if status.is_success() => {}
            Ok(status) => tracing::warn!(%status, "session deletion rejected"),
            Err(e) => tracing::warn!(error = %e, "session deletion failed"),
        }

        self.phase.send_replace(AuthPhase::SignedOut);
        self.navigator.push(ROOT_PATH);
        Outcome::Completed
    }

    /// Adopt a session the server already holds, e.g. the user from
    /// `GET /api/auth/me` after a reload. Ignored while a hand-off is in flight.
    pub fn resume_session(&self, user: User) {
        if self.is_pending() {
            return;
        }
        self.phase.send_if_modified(|phase| {
            if matches!(phase, AuthPhase::Pending(_)) || phase.user() == Some(&user) {
                return false;
            }
            tracing::debug!(email = %user.email, "session resumed");
            *phase = AuthPhase::SignedIn(user);
            true
        });
    }

    /// Apply an identity change reported by the provider.
    ///
    /// Ignored while a hand-off is in flight. Losing the identity signs the
    /// client out; a new profile for the signed-in user replaces the old one.
    /// A provider identity alone never signs the client in.
    pub fn apply_identity(&self, user: Option<User>) {
        if self.is_pending() {
            return;
        }
        self.phase.send_if_modified(|phase| match (phase, user) {
            (AuthPhase::Pending(_) | AuthPhase::SignedOut, _) => false,
            (phase, None) => {
                tracing::info!("identity lost; signed out");
                *phase = AuthPhase::SignedOut;
                true
            }
            (AuthPhase::SignedIn(current), Some(user)) => {
                if *current == user {
                    return false;
                }
                *current = user;
                true
            }
        });
    }
}

/// Feeds provider identity changes into an `AuthController`.
///
/// The subscription lives as long as the listener; dropping it stops the task.
pub struct IdentityListener {
    task: JoinHandle<()>,
}

impl IdentityListener {
    #[must_use]
    pub fn spawn(controller: Arc<AuthController>) -> Self {
        let mut identity = controller.provider.subscribe();
        let task = tokio::spawn(async move {
            while identity.changed().await.is_ok() {
                let user = identity.borrow_and_update().clone();
                controller.apply_identity(user);
            }
            tracing::debug!("identity provider closed");
        });
        Self { task }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for IdentityListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
