//! Registry endpoints for projects, extensions and items.
//!
//! Handler modules parse and validate input, `storage` owns the SQL and
//! response shaping. Item creation is the only write that allocates a
//! typecode.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

pub mod extensions;
pub mod health;
pub mod items;
pub mod projects;
mod storage;
pub mod types;

/// Malformed or non-JSON request bodies are reported as `400`.
fn invalid_body(rejection: &JsonRejection) -> Response {
    debug!("Rejected request body: {rejection}");
    (StatusCode::BAD_REQUEST, "Invalid request body.").into_response()
}

/// Trims `value` and returns `None` when nothing is left.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
