//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Numeric identifier of an organization (the multi-tenant boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(u64);

/// Opaque identifier of an authenticatable identity.
///
/// Backends are free to use integers, UUIDs or anything else; the value is
/// carried as a string so it can travel in a token `sub` claim unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl OrgId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for OrgId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for OrgId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<OrgId> for u64 {
    fn from(value: OrgId) -> Self {
        value.0
    }
}

impl FromStr for OrgId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("OrgId: {e}")))
    }
}

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for IdentityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<Uuid> for IdentityId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_id_parses_and_displays() {
        let id: OrgId = "42".parse().unwrap();
        assert_eq!(id, OrgId::new(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn org_id_rejects_garbage() {
        let err = "acme".parse::<OrgId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn identity_id_serializes_transparently() {
        let id = IdentityId::from(7u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
        assert_eq!(id.as_str(), "7");
    }
}
