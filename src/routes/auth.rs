//! Auth routes: session hand-off, Google OAuth redirect flow, current user.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::guard::DASHBOARD_PATH;
use crate::services::identity::{IdentityError, OAUTH_SCOPES};
use crate::services::session::{self, SESSION_COOKIE};
use crate::state::AppState;
use crate::types::{ApiResponse, User};

const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

fn session_cookie(token: String, secure: bool, ttl: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(ttl)
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
}

fn identity_error_to_status(err: &IdentityError) -> StatusCode {
    match err {
        IdentityError::EmptyCredential => StatusCode::BAD_REQUEST,
        IdentityError::Provider(_) | IdentityError::TokenExchange(_) => StatusCode::BAD_GATEWAY,
        IdentityError::Rejected(_) | IdentityError::AudienceMismatch(_) | IdentityError::IssuerMismatch(_) => {
            StatusCode::UNAUTHORIZED
        }
    }
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::<User>::err(message))).into_response()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user resolved from the session cookie.
/// Use as a handler parameter to require authentication on API routes.
pub struct AuthUser {
    pub user: User,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = session_token(&jar) else {
            return Err(StatusCode::UNAUTHORIZED);
        };

        let app_state = AppState::from_ref(state);
        let user = app_state
            .sessions
            .lookup(token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user })
    }
}

// =============================================================================
// SESSION HAND-OFF
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    token: String,
}

/// `POST /api/auth/session`: exchange an identity credential for a session cookie.
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = payload else {
        return api_error(StatusCode::BAD_REQUEST, "invalid request body");
    };
    if body.token.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "missing token");
    }

    let user = match state.verifier.verify(&body.token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "credential verification failed");
            return api_error(identity_error_to_status(&e), "invalid credential");
        }
    };

    // Replace rather than stack sessions when a client signs in again.
    if let Some(previous) = session_token(&jar) {
        if let Err(e) = state.sessions.delete(previous).await {
            tracing::warn!(error = %e, "previous session cleanup failed");
        }
    }

    let token = match state.sessions.create(&user, state.config.session_ttl).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "session creation failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to create session");
        }
    };

    tracing::info!(user_id = %user.id, "session created");
    let jar = jar.add(session_cookie(token, state.config.cookie_secure, state.config.session_ttl));
    (jar, Json(ApiResponse::ok(user))).into_response()
}

/// `DELETE /api/auth/session`: drop the session and clear the cookie.
///
/// Always answers 204: sign-out is best-effort and a store failure only logs.
pub async fn delete_session(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = session_token(&jar) {
        if let Err(e) = state.sessions.delete(token).await {
            tracing::error!(error = %e, "session deletion failed");
        }
    }

    let jar = jar.add(expired_cookie(SESSION_COOKIE, state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuthConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub google_client_id: String,
    pub scopes: Vec<&'static str>,
}

/// `GET /api/auth/config`: public settings the browser SDK needs to sign in.
pub async fn client_config(State(state): State<AppState>) -> Json<ClientAuthConfig> {
    let firebase = &state.config.firebase;
    Json(ClientAuthConfig {
        api_key: firebase.api_key.clone(),
        auth_domain: firebase.auth_domain.clone(),
        project_id: firebase.project_id.clone(),
        google_client_id: state.config.google.client_id.clone(),
        scopes: OAUTH_SCOPES.to_vec(),
    })
}

// =============================================================================
// GOOGLE OAUTH REDIRECT FLOW
// =============================================================================

/// `GET /api/auth/google`: redirect to Google's consent page.
pub async fn google_redirect(State(state): State<AppState>) -> Response {
    let oauth_state = session::generate_token();
    let cookie = Cookie::build((OAUTH_STATE_COOKIE_NAME, oauth_state.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::minutes(10));

    let jar = CookieJar::new().add(cookie);
    (jar, Redirect::temporary(&state.oauth.authorize_url(&oauth_state))).into_response()
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /api/auth/google/callback`: exchange code, verify, set cookie, redirect to the dashboard.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let secure = state.config.cookie_secure;

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(%error, "google consent denied");
        return (StatusCode::UNAUTHORIZED, "sign-in was cancelled").into_response();
    }

    // Verify OAuth CSRF state from cookie.
    let Some(callback_state) = params.state.as_deref() else {
        return (StatusCode::BAD_REQUEST, "missing oauth state").into_response();
    };
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(Cookie::value)
        .unwrap_or_default();
    if expected_state.is_empty() || expected_state != callback_state {
        return (StatusCode::UNAUTHORIZED, "invalid oauth state").into_response();
    }
    let Some(code) = params.code.as_deref() else {
        return (StatusCode::BAD_REQUEST, "missing authorization code").into_response();
    };

    let id_token = match state.oauth.exchange_code(code).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "oauth code exchange failed");
            return (StatusCode::BAD_GATEWAY, "OAuth code exchange failed").into_response();
        }
    };

    let user = match state.verifier.verify(&id_token).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "id token verification failed");
            return (identity_error_to_status(&e), "identity verification failed").into_response();
        }
    };

    let token = match state.sessions.create(&user, state.config.session_ttl).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "session creation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session").into_response();
        }
    };

    tracing::info!(user_id = %user.id, "session created via oauth redirect");
    let jar = jar
        .add(session_cookie(token, secure, state.config.session_ttl))
        .add(expired_cookie(OAUTH_STATE_COOKIE_NAME, secure));
    (jar, Redirect::temporary(DASHBOARD_PATH)).into_response()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
