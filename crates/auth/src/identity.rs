//! Identity capability and the small value types that travel with it.

use serde::{Deserialize, Serialize};

use gatehouse_core::IdentityId;

/// Anything that can authenticate.
///
/// Concrete user records implement this; the authenticator never needs to
/// know their schema.
pub trait Identity: Send + Sync {
    fn id(&self) -> IdentityId;
    fn username(&self) -> &str;
    /// Stored one-way hash of the password (bcrypt).
    fn password_hash(&self) -> &str;
}

impl<T: Identity + ?Sized> Identity for &T {
    fn id(&self) -> IdentityId {
        (**self).id()
    }

    fn username(&self) -> &str {
        (**self).username()
    }

    fn password_hash(&self) -> &str {
        (**self).password_hash()
    }
}

/// Minimal snapshot of an authenticated identity.
///
/// Stored in the session at login and attached to request extensions by the
/// guard, so handlers can display the caller without re-fetching the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: IdentityId,
    pub username: String,
}

impl AuthUser {
    pub fn new(id: impl Into<IdentityId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }

    pub fn from_identity(identity: &(impl Identity + ?Sized)) -> Self {
        Self {
            id: identity.id(),
            username: identity.username().to_string(),
        }
    }
}

/// Plain identity record, handy for tests and for callers whose user model
/// already lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredUser {
    pub id: IdentityId,
    pub username: String,
    pub password: String,
}

impl CredUser {
    pub fn new(
        id: impl Into<IdentityId>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password_hash.into(),
        }
    }
}

impl Identity for CredUser {
    fn id(&self) -> IdentityId {
        self.id.clone()
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn password_hash(&self) -> &str {
        &self.password
    }
}

/// Username/password pair supplied by a login request. Never persisted.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
