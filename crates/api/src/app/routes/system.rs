use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let user = principal.user();
    Json(json!({
        "id": user.id.as_str(),
        "username": user.username,
    }))
}

pub async fn home(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(json!({ "user": principal.user() }))
}
