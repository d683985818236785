//! REST helpers for the session endpoints.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures surface as `HandoffError::Http`. A non-2xx answer is not
//! an error at this layer: callers get the status and decide what it means,
//! since sign-in and sign-out treat rejections differently.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::HandoffError;
use crate::identity::User;

pub const SESSION_PATH: &str = "/api/auth/session";
pub const ME_PATH: &str = "/api/auth/me";
pub const CONFIG_PATH: &str = "/api/auth/config";

/// Server endpoints that create and drop the session cookie.
#[async_trait::async_trait]
pub trait SessionEndpoint: Send + Sync {
    /// `POST /api/auth/session` with `{ "token": id_token }`.
    ///
    /// # Errors
    ///
    /// Returns `HandoffError::Http` if the request could not be sent.
    async fn create_session(&self, id_token: &str) -> Result<StatusCode, HandoffError>;

    /// `DELETE /api/auth/session`, no body.
    ///
    /// # Errors
    ///
    /// Returns `HandoffError::Http` if the request could not be sent.
    async fn delete_session(&self) -> Result<StatusCode, HandoffError>;
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    token: &'a str,
}

/// Public sign-in settings served by `GET /api/auth/config`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuthConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub google_client_id: String,
    pub scopes: Vec<String>,
}

/// reqwest-backed session client.
///
/// The cookie store keeps the `session` cookie set by the server, so later
/// calls through the same client carry it automatically.
#[derive(Clone)]
pub struct HttpSessionApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionApi {
    /// # Errors
    ///
    /// Returns `HandoffError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, HandoffError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch the user behind the current session. `None` when signed out.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unexpected status.
    pub async fn current_user(&self) -> Result<Option<User>, HandoffError> {
        let resp = self.http.get(self.url(ME_PATH)).send().await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => Ok(None),
            status if status.is_success() => Ok(Some(resp.json::<User>().await?)),
            status => Err(HandoffError::Status(status)),
        }
    }

    /// Fetch the public settings the identity SDK is initialised with.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn fetch_config(&self) -> Result<ClientAuthConfig, HandoffError> {
        let resp = self.http.get(self.url(CONFIG_PATH)).send().await?;
        if !resp.status().is_success() {
            return Err(HandoffError::Status(resp.status()));
        }
        Ok(resp.json::<ClientAuthConfig>().await?)
    }
}

#[async_trait::async_trait]
impl SessionEndpoint for HttpSessionApi {
    async fn create_session(&self, id_token: &str) -> Result<StatusCode, HandoffError> {
        let resp = self
            .http
            .post(self.url(SESSION_PATH))
            .json(&CreateSessionBody { token: id_token })
            .send()
            .await?;
        Ok(resp.status())
    }

    async fn delete_session(&self) -> Result<StatusCode, HandoffError> {
        let resp = self.http.delete(self.url(SESSION_PATH)).send().await?;
        Ok(resp.status())
    }
}
