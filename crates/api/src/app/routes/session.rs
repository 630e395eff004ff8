//! Login and logout.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

use gatehouse_auth::{AuthError, AuthUser, SessionKey};
use gatehouse_core::ValidationErrors;
use gatehouse_infra::User;

use crate::app::AppState;
use crate::app::dto::{FormOrJson, LoginInput};
use crate::app::errors::internal_error;
use crate::app::routes::rejected;
use crate::context::{RenewedSession, TenantContext};
use crate::flash::{self, Flash};
use crate::request::{self, JWT_COOKIE};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub async fn show_login(State(state): State<AppState>, session: Option<Extension<SessionKey>>) -> Json<Flash> {
    Json(flash::take(&state.auth, session.as_ref().map(|Extension(key)| key)).await)
}

pub async fn login(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    session: Option<Extension<SessionKey>>,
    headers: HeaderMap,
    FormOrJson(input): FormOrJson<LoginInput>,
) -> Response {
    let session = session.map(|Extension(key)| key);

    let errors = input.validate();
    if !errors.is_empty() {
        return rejected(&state, session.as_ref(), &headers, &errors).await;
    }

    let user = match state.users.find_by_email(Some(tenant.org_id()), &input.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(org_id = %tenant.org_id(), "login for unknown email");
            return rejected(&state, session.as_ref(), &headers, &credential_errors()).await;
        }
        Err(err) => {
            error!(error = %err, "user lookup failed");
            return internal_error();
        }
    };

    let credentials = input.credentials();
    let outcome = match state
        .auth
        .login(session.as_ref(), &user, &credentials.username, &credentials.password)
        .await
    {
        Ok(outcome) => outcome,
        Err(AuthError::InvalidCredentials | AuthError::UserNotFound) => {
            debug!(user_id = user.id, "login rejected");
            return rejected(&state, session.as_ref(), &headers, &credential_errors()).await;
        }
        Err(err) => {
            error!(error = %err, "login failed");
            return internal_error();
        }
    };

    if input.remember() {
        remember(&state, outcome.session.as_ref(), &user).await;
    }

    let mut res = if request::responds_with_json(&headers) {
        Json(json!({
            "token": outcome.token,
            "user": AuthUser::from_identity(&user),
        }))
        .into_response()
    } else {
        let mut res = Redirect::to(state.auth.home_route()).into_response();
        if let Some(token) = &outcome.token {
            set_cookie(&mut res, &format!("{JWT_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/"));
        }
        res
    };
    if let Some(renewed) = outcome.session {
        res.extensions_mut().insert(RenewedSession(renewed));
    }
    res
}

pub async fn logout(State(state): State<AppState>, session: Option<Extension<SessionKey>>) -> Response {
    let session = session.map(|Extension(key)| key);
    if let Err(err) = state.auth.logout(session.as_ref()).await {
        error!(error = %err, "logout failed");
        return internal_error();
    }

    let mut res = Redirect::to(state.auth.home_route()).into_response();
    if state.auth.uses_tokens() {
        set_cookie(&mut res, &format!("{JWT_COOKIE}=; Max-Age=0; Path=/"));
    }
    res
}

async fn remember(state: &AppState, session: Option<&SessionKey>, user: &User) {
    let (Some(store), Some(session)) = (state.auth.session_store(), session) else {
        return;
    };
    if let Err(err) = store.remember_me(session, true).await {
        warn!(error = %err, "failed to extend session lifetime");
        return;
    }
    if let Err(err) = state.users.set_remember_token(user.id, &store.token(session)).await {
        warn!(error = %err, "failed to store remember token");
    }
}

fn credential_errors() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add("email", INVALID_CREDENTIALS);
    errors.add("password", INVALID_CREDENTIALS);
    errors
}

fn set_cookie(res: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => warn!(error = %err, "invalid cookie value"),
    }
}
