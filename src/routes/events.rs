//! Calendar event routes.
//!
//! Placeholders: each method acknowledges the request with a fixed message and
//! echoes any JSON body back. Nothing is persisted and no calendar API is called.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};

fn failure(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
}

/// `GET /api/events`
pub async fn list_events() -> Json<Value> {
    Json(json!({ "message": "Get events endpoint" }))
}

/// `POST /api/events`
pub async fn create_event(payload: Result<Json<Value>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(body)) => Json(json!({ "message": "Create event endpoint", "data": body })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "create event body rejected");
            failure("Failed to create event")
        }
    }
}

/// `PUT /api/events`
pub async fn update_event(payload: Result<Json<Value>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(body)) => Json(json!({ "message": "Update event endpoint", "data": body })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "update event body rejected");
            failure("Failed to update event")
        }
    }
}

/// `DELETE /api/events`
pub async fn delete_event() -> Json<Value> {
    Json(json!({ "message": "Delete event endpoint" }))
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
