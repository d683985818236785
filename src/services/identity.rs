//! Google identity service: ID-token verification, OAuth redirect and code exchange.
//!
//! SYSTEM CONTEXT
//! ==============
//! Browsers sign in against Google (directly or through the Firebase SDK's
//! Google provider) and hand the Google-issued ID token to
//! `POST /api/auth/session`. The server checks the token with Google's
//! `tokeninfo` endpoint, which only vouches for tokens issued by
//! `accounts.google.com`, and only trusts its own OAuth client id as audience.
//! Firebase session ID tokens (issuer `securetoken.google.com`) are rejected.
//!
//! The redirect flow (`/api/auth/google`) is the server-driven alternative: it
//! ends in the same verification step with the `id_token` from the code exchange.

use serde::Deserialize;
use url::form_urlencoded;

use crate::types::User;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Calendar read/write plus basic profile.
pub const OAUTH_SCOPES: [&str; 5] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
    "openid",
    "email",
    "profile",
];

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("empty credential")]
    EmptyCredential,
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("unexpected audience: {0}")]
    AudienceMismatch(String),
    #[error("unexpected issuer: {0}")]
    IssuerMismatch(String),
    #[error("identity provider unavailable: {0}")]
    Provider(String),
    #[error("oauth code exchange failed: {0}")]
    TokenExchange(String),
}

/// Verifies an identity credential and yields the user it asserts. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify an ID token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Rejected`], [`IdentityError::AudienceMismatch`] or [`IdentityError::IssuerMismatch`]
    /// for bad credentials and [`IdentityError::Provider`] when the provider is unreachable.
    async fn verify(&self, id_token: &str) -> Result<User, IdentityError>;
}

/// Subset of the `tokeninfo` response we rely on.
#[derive(Debug, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Map verified claims to a `User`, enforcing issuer, audience and a verified email.
pub(crate) fn user_from_claims(claims: TokenClaims, audiences: &[String]) -> Result<User, IdentityError> {
    if !GOOGLE_ISSUERS.contains(&claims.iss.as_str()) {
        return Err(IdentityError::IssuerMismatch(claims.iss));
    }
    if !audiences.iter().any(|a| *a == claims.aud) {
        return Err(IdentityError::AudienceMismatch(claims.aud));
    }
    let Some(email) = claims.email.filter(|e| !e.is_empty()) else {
        return Err(IdentityError::Rejected("token carries no email".into()));
    };
    if claims.email_verified.as_deref() == Some("false") {
        return Err(IdentityError::Rejected("email not verified".into()));
    }
    Ok(User { id: claims.sub, email, display_name: claims.name, photo_url: claims.picture })
}

// =============================================================================
// TOKENINFO VERIFIER
// =============================================================================

pub struct GoogleTokenVerifier {
    http: reqwest::Client,
    tokeninfo_url: String,
    audiences: Vec<String>,
}

impl GoogleTokenVerifier {
    #[must_use]
    pub fn new(http: reqwest::Client, audiences: Vec<String>) -> Self {
        Self { http, tokeninfo_url: GOOGLE_TOKENINFO_URL.to_owned(), audiences }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_tokeninfo_url(mut self, url: impl Into<String>) -> Self {
        self.tokeninfo_url = url.into();
        self
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<User, IdentityError> {
        if id_token.trim().is_empty() {
            return Err(IdentityError::EmptyCredential);
        }

        let resp = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(IdentityError::Provider(format!("tokeninfo returned {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{status}: {body}")));
        }

        let claims = resp
            .json::<TokenClaims>()
            .await
            .map_err(|e| IdentityError::Rejected(format!("malformed tokeninfo response: {e}")))?;
        user_from_claims(claims, &self.audiences)
    }
}

// =============================================================================
// OAUTH REDIRECT FLOW
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    http: reqwest::Client,
}

impl GoogleOAuth {
    #[must_use]
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self { client_id, client_secret, redirect_uri, token_url: GOOGLE_TOKEN_URL.to_owned(), http }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Build the Google authorization URL carrying the CSRF `state`.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &OAUTH_SCOPES.join(" "))
            .append_pair("state", state)
            .finish();
        format!("{GOOGLE_AUTH_URL}?{query}")
    }

    /// Exchange an authorization code for the user's ID token.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::TokenExchange`] if the request fails or the
    /// response lacks an `id_token`.
    pub async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::TokenExchange(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::TokenExchange(format!("{status}: {body}")));
        }

        let body = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| IdentityError::TokenExchange(e.to_string()))?;
        body.id_token
            .ok_or_else(|| IdentityError::TokenExchange("response carried no id_token".into()))
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
