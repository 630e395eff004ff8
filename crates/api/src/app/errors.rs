use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use gatehouse_core::ValidationErrors;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 500 for infrastructure faults; details stay in the logs.
pub fn internal_error() -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
}

/// 422 with field-scoped errors, for JSON clients.
pub fn validation_failed(errors: &ValidationErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": "validation_error",
            "errors": errors,
        })),
    )
        .into_response()
}
