use std::collections::HashMap;

use super::*;
use axum::Router;
use axum::body::Body;
use axum::extract::Form;
use axum::http::{Request, header};
use axum::routing::post;
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::services::session::SessionStore;
use crate::state::test_helpers::{test_app_state, test_user};

async fn call(state: &AppState, request: Request<Body>) -> Response {
    crate::routes::app(state.clone()).oneshot(request).await.unwrap()
}

fn post_session(body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/auth/session").header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}

fn session_value(resp: &Response) -> Option<String> {
    set_cookies(resp).into_iter().find_map(|c| {
        let pair = c.split(';').next()?.to_owned();
        pair.strip_prefix("session=").map(str::to_owned)
    })
}

async fn json_body(resp: Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// helpers
// =============================================================================

#[test]
fn identity_errors_map_to_statuses() {
    assert_eq!(identity_error_to_status(&IdentityError::EmptyCredential), StatusCode::BAD_REQUEST);
    assert_eq!(identity_error_to_status(&IdentityError::Rejected("x".into())), StatusCode::UNAUTHORIZED);
    assert_eq!(identity_error_to_status(&IdentityError::AudienceMismatch("x".into())), StatusCode::UNAUTHORIZED);
    assert_eq!(identity_error_to_status(&IdentityError::IssuerMismatch("x".into())), StatusCode::UNAUTHORIZED);
    assert_eq!(identity_error_to_status(&IdentityError::Provider("x".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(identity_error_to_status(&IdentityError::TokenExchange("x".into())), StatusCode::BAD_GATEWAY);
}

#[test]
fn session_cookie_attributes() {
    let cookie = session_cookie("tok".into(), true, Duration::hours(2));
    assert_eq!(cookie.name(), SESSION_COOKIE);
    assert_eq!(cookie.value(), "tok");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.max_age(), Some(Duration::hours(2)));
}

#[test]
fn expired_cookie_has_zero_max_age() {
    let cookie = expired_cookie(SESSION_COOKIE, false);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
}

// =============================================================================
// POST /api/auth/session
// =============================================================================

#[tokio::test]
async fn create_session_sets_cookie_and_returns_user() {
    let (state, store) = test_app_state();
    let resp = call(&state, post_session(r#"{"token":"valid-token"}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let token = session_value(&resp).expect("session cookie set");
    assert!(!token.is_empty());
    let header = set_cookies(&resp).join("\n");
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));
    assert_eq!(store.lookup(&token).await.unwrap(), Some(test_user()));

    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "ada@example.com");
}

#[tokio::test]
async fn create_session_rejected_credential_is_401_without_cookie() {
    let (state, store) = test_app_state();
    let resp = call(&state, post_session(r#"{"token":"forged"}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_value(&resp).is_none());
    assert_eq!(store.len().await, 0);

    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "invalid credential");
}

#[tokio::test]
async fn create_session_provider_outage_is_502() {
    let (state, _) = test_app_state();
    let resp = call(&state, post_session(r#"{"token":"provider-down"}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn create_session_empty_token_is_400() {
    let (state, _) = test_app_state();
    let resp = call(&state, post_session(r#"{"token":"  "}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_session_malformed_body_is_400() {
    let (state, _) = test_app_state();
    let resp = call(&state, post_session("{not json", None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = call(&state, post_session(r#"{"credential":"valid-token"}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_session_replaces_previous_session() {
    let (state, store) = test_app_state();
    let old = store.create(&test_user(), Duration::hours(1)).await.unwrap();

    let resp = call(&state, post_session(r#"{"token":"valid-token"}"#, Some(&format!("session={old}")))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.lookup(&old).await.unwrap(), None);
    assert_eq!(store.len().await, 1);
}

// =============================================================================
// DELETE /api/auth/session
// =============================================================================

#[tokio::test]
async fn delete_session_removes_and_clears_cookie() {
    let (state, store) = test_app_state();
    let token = store.create(&test_user(), Duration::hours(1)).await.unwrap();

    let req = Request::delete("/api/auth/session")
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = call(&state, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(session_value(&resp).as_deref(), Some(""));
    assert!(set_cookies(&resp).join("\n").contains("Max-Age=0"));
    assert_eq!(store.lookup(&token).await.unwrap(), None);
}

#[tokio::test]
async fn delete_session_without_cookie_still_succeeds() {
    let (state, _) = test_app_state();
    let req = Request::delete("/api/auth/session").body(Body::empty()).unwrap();
    let resp = call(&state, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

// =============================================================================
// GET /api/auth/me
// =============================================================================

#[tokio::test]
async fn me_without_cookie_is_401() {
    let (state, _) = test_app_state();
    let resp = call(&state, Request::get("/api/auth/me").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_with_unknown_cookie_is_401() {
    let (state, _) = test_app_state();
    let req = Request::get("/api/auth/me")
        .header(header::COOKIE, "session=deadbeef")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&state, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_session_user() {
    let (state, store) = test_app_state();
    let token = store.create(&test_user(), Duration::hours(1)).await.unwrap();
    let req = Request::get("/api/auth/me")
        .header(header::COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = call(&state, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["id"], "google-42");
    assert_eq!(body["displayName"], "Ada");
}

#[tokio::test]
async fn client_config_exposes_public_settings() {
    let (state, _) = test_app_state();
    let resp = call(&state, Request::get("/api/auth/config").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["projectId"], "demo");
    assert_eq!(body["googleClientId"], "client-id");
    assert!(body["scopes"].as_array().unwrap().iter().any(|s| s == "openid"));
    assert!(body.get("clientSecret").is_none());
}

// =============================================================================
// Google redirect flow
// =============================================================================

#[tokio::test]
async fn google_redirect_sets_state_cookie() {
    let (state, _) = test_app_state();
    let resp = call(&state, Request::get("/api/auth/google").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap().to_owned();
    let state_cookie = set_cookies(&resp)
        .into_iter()
        .find_map(|c| c.split(';').next()?.strip_prefix("oauth_state=").map(str::to_owned))
        .expect("oauth_state cookie set");
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains(&format!("state={state_cookie}")));
}

#[tokio::test]
async fn google_callback_rejects_missing_state() {
    let (state, _) = test_app_state();
    let req = Request::get("/api/auth/google/callback?code=abc").body(Body::empty()).unwrap();
    assert_eq!(call(&state, req).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn google_callback_rejects_mismatched_state() {
    let (state, _) = test_app_state();
    let req = Request::get("/api/auth/google/callback?code=abc&state=one")
        .header(header::COOKIE, "oauth_state=two")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&state, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn google_callback_consent_denied_is_401() {
    let (state, _) = test_app_state();
    let req = Request::get("/api/auth/google/callback?error=access_denied&state=s")
        .header(header::COOKIE, "oauth_state=s")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&state, req).await.status(), StatusCode::UNAUTHORIZED);
}

async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Response {
    match form.get("code").map(String::as_str) {
        Some("good-code") => Json(serde_json::json!({ "id_token": "valid-token" })).into_response(),
        Some("unverifiable-code") => Json(serde_json::json!({ "id_token": "forged" })).into_response(),
        _ => (StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#).into_response(),
    }
}

/// App state whose OAuth client talks to a local token endpoint.
async fn state_with_token_endpoint() -> (AppState, std::sync::Arc<crate::services::session::MemorySessionStore>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, Router::new().route("/token", post(token_endpoint))).await;
    });
    let (mut state, store) = test_app_state();
    state.oauth = state.oauth.clone().with_token_url(format!("http://{addr}/token"));
    (state, store)
}

fn callback(code: &str) -> Request<Body> {
    Request::get(format!("/api/auth/google/callback?code={code}&state=s"))
        .header(header::COOKIE, "oauth_state=s")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn google_callback_success_creates_session_and_redirects() {
    let (state, store) = state_with_token_endpoint().await;
    let resp = call(&state, callback("good-code")).await;

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/dashboard");

    let token = session_value(&resp).expect("session cookie set");
    assert_eq!(store.lookup(&token).await.unwrap(), Some(test_user()));

    let state_cookie = set_cookies(&resp)
        .into_iter()
        .find(|c| c.starts_with("oauth_state="))
        .expect("oauth_state cookie cleared");
    assert!(state_cookie.starts_with("oauth_state=;"));
    assert!(state_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn google_callback_failed_exchange_is_502() {
    let (state, store) = state_with_token_endpoint().await;
    let resp = call(&state, callback("expired-code")).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(session_value(&resp).is_none());
    assert_eq!(store.len().await, 0);
}

#[tokio::test]
async fn google_callback_unverifiable_token_is_401() {
    let (state, store) = state_with_token_endpoint().await;
    let resp = call(&state, callback("unverifiable-code")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_value(&resp).is_none());
    assert_eq!(store.len().await, 0);
}
