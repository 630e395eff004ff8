use gatehouse_auth::{AuthUser, SessionKey};
use gatehouse_core::OrgId;

/// Tenant context for a request, inserted by the tenant resolver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    org_id: OrgId,
}

impl TenantContext {
    pub fn new(org_id: OrgId) -> Self {
        Self { org_id }
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }
}

/// Authenticated caller of a request, inserted by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user: AuthUser,
}

impl PrincipalContext {
    pub fn new(user: AuthUser) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &AuthUser {
        &self.user
    }
}

/// Response extension set by a handler that moved the session to a new key;
/// the session middleware turns it into the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedSession(pub SessionKey);
