use thiserror::Error;

use crate::session::SessionError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication failures.
///
/// These are returned to the caller, never logged and swallowed here; the
/// HTTP layer decides whether a failure becomes a redirect or a response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("login failed")]
    LoginFailed,

    #[error("no strategy provided: either a session store or a token config must be configured")]
    NoStrategy,

    #[error("no secret provided: the JWT_SECRET env variable must be set")]
    NoSecret,

    #[error("no session provided: the session strategy requires a session key")]
    NoSession,

    #[error("user session doesn't exist")]
    NoUserSession,

    #[error("invalid jwt signature")]
    InvalidJwtSign,

    #[error("jwt not found in cookie or authorization header")]
    MissingToken,

    #[error("could not parse jwt: {0}")]
    TokenParse(String),

    #[error("could not sign jwt: {0}")]
    TokenSign(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("authenticator already initialized")]
    AlreadyInitialized,
}
