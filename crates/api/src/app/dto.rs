//! Request bodies and the form-or-JSON extractor.

use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use gatehouse_auth::Credentials;
use gatehouse_core::ValidationErrors;

use crate::app::errors::json_error;
use crate::request;

/// Login form. Users sign in with their email.
#[derive(Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember_me: Option<Flag>,
}

impl LoginInput {
    pub fn remember(&self) -> bool {
        self.remember_me.as_ref().is_some_and(Flag::is_set)
    }

    /// The email doubles as the username.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.email.clone(),
            password: self.password.clone(),
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.require("email", &self.email);
        errors.require("password", &self.password);
        errors
    }
}

impl core::fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginInput")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember_me", &self.remember())
            .finish()
    }
}

/// Checkbox-style boolean: JSON `true`, or a form value such as `on`/`1`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes"),
        }
    }
}

/// Registration form: a new organization plus its first user.
#[derive(Deserialize)]
pub struct RegistrationInput {
    #[serde(default)]
    pub org_username: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub org_email: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegistrationInput {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("org_username", &self.org_username),
            ("org_name", &self.org_name),
            ("org_email", &self.org_email),
            ("email", &self.email),
            ("password", &self.password),
            ("username", &self.username),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            errors.require(field, value);
        }
        errors
    }
}

impl core::fmt::Debug for RegistrationInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistrationInput")
            .field("org_username", &self.org_username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Accepts the same payload as JSON, urlencoded form or multipart form.
pub struct FormOrJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = request::content_type(req.headers()).to_string();

        if content_type.contains("json") {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(value));
        }

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            let mut fields = serde_json::Map::new();
            while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let text = field.text().await.map_err(IntoResponse::into_response)?;
                fields.insert(name, serde_json::Value::String(text));
            }
            return serde_json::from_value(serde_json::Value::Object(fields))
                .map(Self)
                .map_err(|err| json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_body", err.to_string()));
        }

        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_flag_accepts_form_and_json_shapes() {
        let json: LoginInput = serde_json::from_str(r#"{"email":"a","password":"b","remember_me":true}"#).unwrap();
        assert!(json.remember());

        let form: LoginInput = serde_json::from_str(r#"{"email":"a","password":"b","remember_me":"on"}"#).unwrap();
        assert!(form.remember());

        let off: LoginInput = serde_json::from_str(r#"{"email":"a","password":"b"}"#).unwrap();
        assert!(!off.remember());
    }

    #[test]
    fn login_debug_redacts_password() {
        let input: LoginInput = serde_json::from_str(r#"{"email":"a@b.c","password":"hunter2"}"#).unwrap();
        let rendered = format!("{input:?}");
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn registration_requires_every_field() {
        let input: RegistrationInput = serde_json::from_str(r#"{"org_username":"acme","email":"a@b.c"}"#).unwrap();
        let errors = input.validate();
        assert!(errors.get("org_username").is_none());
        assert_eq!(errors.get("org_name").unwrap(), ["org_name is required"]);
        assert_eq!(errors.get("last_name").unwrap(), ["last_name is required"]);
    }
}
