//! Route guard: path classification and redirect decisions.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs in front of every page request. A path is `Protected` (needs a session),
//! `AuthOnly` (sign-in surfaces, needs no session) or `Public`. The only request
//! input is whether a non-empty session cookie is present; the cookie's value is
//! never validated here. Paths under `/api/` are excluded and police their own
//! auth through the `AuthUser` extractor.
//!
//! Rules run on the canonical path (percent-decoded, empty and `.` segments
//! dropped, `..` applied), which is the path the static file service resolves.
//! `/%64ashboard/` and `//dashboard/` are therefore both `/dashboard/`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use crate::services::session::SESSION_COOKIE;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

const PROTECTED_PREFIXES: [&str; 3] = ["/dashboard", "/calendar", "/settings"];
const AUTH_ONLY_PREFIXES: [&str; 2] = ["/login", "/signup"];
const EXCLUDED_PREFIXES: [&str; 4] = ["/api/", "/assets/", "/public/", "/favicon.ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    PassThrough,
    RedirectToLogin { from: String },
    RedirectToDashboard,
}

impl GuardDecision {
    /// Redirect target, or `None` for pass-through.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            Self::PassThrough => None,
            Self::RedirectToLogin { from } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair("from", from)
                    .finish();
                Some(format!("{LOGIN_PATH}?{query}"))
            }
            Self::RedirectToDashboard => Some(DASHBOARD_PATH.to_owned()),
        }
    }
}

/// Static prefix lists, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRules {
    pub protected: Vec<String>,
    pub auth_only: Vec<String>,
    pub excluded: Vec<String>,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            protected: PROTECTED_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
            auth_only: AUTH_ONLY_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
            excluded: EXCLUDED_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

impl RouteRules {
    /// Classify a path. Protected wins when both lists match.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if matches_any(path, &self.protected) {
            RouteClass::Protected
        } else if matches_any(path, &self.auth_only) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        matches_any(path, &self.excluded)
    }

    /// Pure decision function: depends only on `path`, `has_session` and the rules.
    #[must_use]
    pub fn decide(&self, path: &str, has_session: bool) -> GuardDecision {
        if self.is_excluded(path) {
            return GuardDecision::PassThrough;
        }
        match (self.classify(path), has_session) {
            (RouteClass::Protected, false) => GuardDecision::RedirectToLogin { from: path.to_owned() },
            (RouteClass::AuthOnly, true) => GuardDecision::RedirectToDashboard,
            _ => GuardDecision::PassThrough,
        }
    }
}

/// Canonical form of a request path. `None` if it does not decode to UTF-8.
#[must_use]
pub fn canonical_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    let mut path = format!("/{}", segments.join("/"));
    if !segments.is_empty() && decoded.ends_with('/') {
        path.push('/');
    }
    Some(path)
}

/// A session is present when the cookie exists with a non-empty value.
/// Unparsable cookie headers are dropped by the jar, which reads as absent.
#[must_use]
pub fn has_session_cookie(jar: &CookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .map(Cookie::value)
        .is_some_and(|v| !v.is_empty())
}

/// Axum middleware applying [`RouteRules::decide`] to each request.
pub async fn route_guard(
    State(rules): State<Arc<RouteRules>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let Some(path) = canonical_path(request.uri().path()) else {
        tracing::debug!(raw = %request.uri().path(), "route guard rejected undecodable path");
        return StatusCode::BAD_REQUEST.into_response();
    };
    let decision = rules.decide(&path, has_session_cookie(&jar));

    match decision.location() {
        Some(location) => {
            tracing::debug!(%path, %location, "route guard redirect");
            Redirect::temporary(&location).into_response()
        }
        None => next.run(request).await,
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
