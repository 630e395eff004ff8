use axum::http::HeaderMap;
use axum::response::Response;

use gatehouse_auth::SessionKey;
use gatehouse_core::ValidationErrors;

use crate::app::AppState;
use crate::app::errors::validation_failed;
use crate::{flash, request};

pub mod registration;
pub mod session;
pub mod system;

/// Form errors: 422 JSON for API clients, otherwise flashed and sent back.
pub(crate) async fn rejected(
    state: &AppState,
    session: Option<&SessionKey>,
    headers: &HeaderMap,
    errors: &ValidationErrors,
) -> Response {
    if request::responds_with_json(headers) {
        return validation_failed(errors);
    }
    flash::back_with_errors(&state.auth, session, headers, errors).await
}
