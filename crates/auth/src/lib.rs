//! `gatehouse-auth` — request authentication and tenant resolution core.
//!
//! This crate is intentionally decoupled from HTTP and storage: requests are
//! described by [`CheckRequest`] / [`TenantSources`], and sessions and
//! organizations are reached through the [`SessionStore`] and
//! [`OrgDirectory`] traits.

pub mod authenticator;
pub mod claims;
pub mod error;
pub mod global;
pub mod identity;
pub mod password;
pub mod session;
pub mod tenant;
pub mod token;

pub use authenticator::{AuthConfig, AuthConfigBuilder, Authenticator, CheckRequest, LoginOutcome};
pub use claims::{RegisteredClaims, TokenClaims, TokenConfig};
pub use error::{AuthError, AuthResult};
pub use identity::{AuthUser, CredUser, Credentials, Identity};
pub use session::{InMemorySessionStore, SessionError, SessionKey, SessionStore, USER_ID_KEY, USER_KEY};
pub use tenant::{DirectoryError, Org, OrgDirectory, TenantSources, resolve_handle};
pub use token::HmacTokens;
