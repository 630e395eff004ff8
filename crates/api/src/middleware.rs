use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error, warn};

use gatehouse_auth::{SessionKey, SessionStore};

use crate::app::AppState;
use crate::app::errors::internal_error;
use crate::context::{PrincipalContext, RenewedSession};
use crate::request::{self, SESSION_COOKIE};

/// Attach the request's [`SessionKey`]. Pass-through when sessions are not
/// configured.
///
/// A presented cookie is honoured only when the store knows the key;
/// otherwise a new session is started and its cookie sent. A handler that
/// renews the session reports the new key via [`RenewedSession`].
pub async fn session_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(store) = state.auth.session_store().cloned() else {
        return next.run(req).await;
    };

    let presented = request::cookie(req.headers(), SESSION_COOKIE)
        .filter(|value| !value.is_empty())
        .map(SessionKey::new);

    let resumed = match presented {
        Some(key) => match store.contains(&key).await {
            Ok(true) => Some(key),
            Ok(false) => {
                debug!("unknown session key presented; starting a new session");
                None
            }
            Err(err) => {
                error!(error = %err, "session lookup failed");
                return internal_error();
            }
        },
        None => None,
    };

    let (key, minted) = match resumed {
        Some(key) => (key, false),
        None => match store.create().await {
            Ok(key) => (key, true),
            Err(err) => {
                error!(error = %err, "failed to start a session");
                return internal_error();
            }
        },
    };

    req.extensions_mut().insert(key.clone());
    let mut res = next.run(req).await;

    let issued = match res.extensions_mut().remove::<RenewedSession>() {
        Some(RenewedSession(renewed)) => Some(renewed),
        None if minted => Some(key),
        None => None,
    };
    if let Some(key) = issued {
        match HeaderValue::from_str(&session_cookie(&key)) {
            Ok(value) => {
                res.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "session key is not a valid cookie value"),
        }
    }
    res
}

fn session_cookie(key: &SessionKey) -> String {
    format!("{SESSION_COOKIE}={key}; HttpOnly; SameSite=Lax; Path=/")
}

/// Let authenticated requests through with a [`PrincipalContext`]; send
/// everyone else to the login route.
pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match state.auth.check(&request::check_request(&req)).await {
        Ok(user) => {
            debug!(user_id = %user.id, path = %req.uri().path(), "guard passed");
            req.extensions_mut().insert(PrincipalContext::new(user));
            next.run(req).await
        }
        Err(err) => {
            debug!(error = %err, path = %req.uri().path(), "guard rejected request");
            Redirect::to(state.auth.login_route()).into_response()
        }
    }
}

/// Only unauthenticated requests pass; authenticated ones go home.
pub async fn guest(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match state.auth.check(&request::check_request(&req)).await {
        Ok(user) => {
            debug!(user_id = %user.id, "already authenticated; redirecting home");
            Redirect::to(state.auth.home_route()).into_response()
        }
        Err(_) => next.run(req).await,
    }
}
