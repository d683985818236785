//! Errors raised along the sign-in hand-off.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("session request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session endpoint answered {0}")]
    Status(StatusCode),
}
