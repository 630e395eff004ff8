//! One-shot session data ("flash") carried across a redirect.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use tracing::warn;

use gatehouse_auth::session::{pop_json, put_json};
use gatehouse_auth::{Authenticator, SessionKey};
use gatehouse_core::ValidationErrors;

use crate::request;

pub const ERRORS_KEY: &str = "errors";
pub const MESSAGE_KEY: &str = "message";

/// Pending flash data, consumed on read.
#[derive(Debug, Default, Serialize)]
pub struct Flash {
    pub errors: ValidationErrors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

async fn put<T: Serialize + ?Sized>(auth: &Authenticator, session: Option<&SessionKey>, key: &str, value: &T) {
    let (Some(store), Some(session)) = (auth.session_store(), session) else {
        return;
    };
    if let Err(err) = put_json(store.as_ref(), session, key, value).await {
        warn!(error = %err, key, "failed to flash session data");
    }
}

pub async fn put_errors(auth: &Authenticator, session: Option<&SessionKey>, errors: &ValidationErrors) {
    put(auth, session, ERRORS_KEY, errors).await;
}

pub async fn put_message(auth: &Authenticator, session: Option<&SessionKey>, message: &str) {
    put(auth, session, MESSAGE_KEY, message).await;
}

/// Pop everything flashed into `session`.
pub async fn take(auth: &Authenticator, session: Option<&SessionKey>) -> Flash {
    let (Some(store), Some(session)) = (auth.session_store(), session) else {
        return Flash::default();
    };
    let store = store.as_ref();

    let errors = pop_json(store, session, ERRORS_KEY).await.unwrap_or_else(|err| {
        warn!(error = %err, "discarding unreadable flashed errors");
        None
    });
    let message = pop_json(store, session, MESSAGE_KEY).await.unwrap_or_else(|err| {
        warn!(error = %err, "discarding unreadable flashed message");
        None
    });

    Flash {
        errors: errors.unwrap_or_default(),
        message,
    }
}

/// Flash `errors` and send the client back where it came from.
pub async fn back_with_errors(
    auth: &Authenticator,
    session: Option<&SessionKey>,
    headers: &HeaderMap,
    errors: &ValidationErrors,
) -> Response {
    put_errors(auth, session, errors).await;
    Redirect::to(&request::back_url(headers)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gatehouse_auth::InMemorySessionStore;

    #[tokio::test]
    async fn flashed_values_are_read_once() {
        let auth = Authenticator::builder()
            .with_session_store(Arc::new(InMemorySessionStore::new()))
            .build()
            .unwrap();
        let key = SessionKey::new("s-1");

        put_errors(&auth, Some(&key), &ValidationErrors::field("email", "Invalid credentials")).await;
        put_message(&auth, Some(&key), "hello").await;

        let flash = take(&auth, Some(&key)).await;
        assert_eq!(flash.errors.get("email").unwrap(), ["Invalid credentials"]);
        assert_eq!(flash.message.as_deref(), Some("hello"));

        let again = take(&auth, Some(&key)).await;
        assert!(again.errors.is_empty());
        assert!(again.message.is_none());
    }

    #[tokio::test]
    async fn without_sessions_flash_is_empty() {
        let auth = Authenticator::builder().build().unwrap();
        put_message(&auth, Some(&SessionKey::new("s")), "lost").await;
        assert!(take(&auth, None).await.message.is_none());
    }
}
