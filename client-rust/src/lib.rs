//! # calendar-client
//!
//! Client half of the sign-in hand-off for the calendar shell.
//!
//! An external identity provider authenticates the user and yields a short-lived
//! credential. `AuthController` trades that credential for the server's session
//! cookie, tracks the `SignedOut | Pending | SignedIn` phase and drives navigation.
//! The pieces it talks to sit behind traits (`IdentityProvider`,
//! `SessionEndpoint`, `Navigator`) so a browser shell or a headless harness can
//! plug in its own.

pub mod error;
pub mod identity;
pub mod nav;
pub mod net;
pub mod state;

pub use error::HandoffError;
pub use identity::{IdentityCredential, IdentityProvider, User};
pub use nav::Navigator;
pub use net::api::{HttpSessionApi, SessionEndpoint};
pub use state::auth::{AuthController, AuthPhase, IdentityListener, Outcome};
