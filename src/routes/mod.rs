//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! API routes live under `/api` and authenticate themselves. Everything else
//! falls through to the static pages in `WEBSITE_DIR`. The route guard wraps
//! the whole router so page requests are classified before any file is served.

pub mod auth;
pub mod events;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::state::AppState;

/// Full application router: API routes, static pages, guard and request tracing.
pub fn app(state: AppState) -> Router {
    let website = ServeDir::new(&state.config.website_dir).append_index_html_on_directories(true);
    let rules = state.rules.clone();

    Router::new()
        .route("/api/auth/session", post(auth::create_session).delete(auth::delete_session))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/config", get(auth::client_config))
        .route("/api/auth/google", get(auth::google_redirect))
        .route("/api/auth/google/callback", get(auth::google_callback))
        .route(
            "/api/events",
            get(events::list_events)
                .post(events::create_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/healthz", get(healthz))
        .fallback_service(website)
        .layer(middleware::from_fn_with_state(rules, guard::route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
