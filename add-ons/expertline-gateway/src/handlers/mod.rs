//! HTTP route handlers: call lifecycle, speech utilities, liveness.

pub mod call;
pub mod health;
pub mod speech;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Non-streamed JSON error body shared by every route.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}
