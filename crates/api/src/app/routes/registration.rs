//! Organization + first-user registration.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tracing::{error, info};

use gatehouse_auth::SessionKey;
use gatehouse_auth::password::hash_password;
use gatehouse_core::ValidationErrors;
use gatehouse_infra::{NewOrg, NewUser, Registered, StoreError};

use crate::app::AppState;
use crate::app::dto::{FormOrJson, RegistrationInput};
use crate::app::errors::internal_error;
use crate::app::routes::rejected;
use crate::flash::{self, Flash};
use crate::request;

pub const REGISTERED_MESSAGE: &str = "Registration Successful. Please Log In.";

pub async fn show(State(state): State<AppState>, session: Option<Extension<SessionKey>>) -> Json<Flash> {
    Json(flash::take(&state.auth, session.as_ref().map(|Extension(key)| key)).await)
}

pub async fn register(
    State(state): State<AppState>,
    session: Option<Extension<SessionKey>>,
    headers: HeaderMap,
    FormOrJson(input): FormOrJson<RegistrationInput>,
) -> Response {
    let session = session.map(|Extension(key)| key);

    let errors = input.validate();
    if !errors.is_empty() {
        return rejected(&state, session.as_ref(), &headers, &errors).await;
    }

    let password = input.password.clone();
    let password_hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(err)) => {
            error!(error = %err, "password hashing failed");
            return internal_error();
        }
        Err(err) => {
            error!(error = %err, "password hashing task failed");
            return internal_error();
        }
    };

    let org = NewOrg {
        org_username: input.org_username,
        org_name: input.org_name,
        org_email: input.org_email,
    };
    let owner = NewUser {
        org_id: None,
        email: input.email,
        username: input.username,
        first_name: input.first_name,
        last_name: input.last_name,
        password_hash,
    };
    let Registered { org, user } = match state.registrar.register(org, owner).await {
        Ok(registered) => registered,
        Err(err) => return store_failure(&state, session.as_ref(), &headers, err).await,
    };

    info!(org_id = %org.id, user_id = user.id, "organization registered");
    flash::put_message(&state.auth, session.as_ref(), REGISTERED_MESSAGE).await;

    if request::responds_with_json(&headers) {
        return (
            StatusCode::CREATED,
            Json(json!({
                "message": REGISTERED_MESSAGE,
                "org": org,
                "user": { "id": user.id, "email": user.email },
            })),
        )
            .into_response();
    }
    Redirect::to(state.auth.login_route()).into_response()
}

async fn store_failure(
    state: &AppState,
    session: Option<&SessionKey>,
    headers: &HeaderMap,
    err: StoreError,
) -> Response {
    match err.conflict_field() {
        Some(field) => {
            let errors = ValidationErrors::field(field, format!("{field} has already been taken"));
            rejected(state, session, headers, &errors).await
        }
        None => {
            error!(error = %err, "registration failed");
            internal_error()
        }
    }
}
