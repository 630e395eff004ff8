//! Tenant (organization) resolution.
//!
//! The handle lookup order is fixed: `tenant` header, then the
//! `org_username` field of a JSON body, then the `org_username` form field,
//! then the first subdomain label. The HTTP layer gathers the raw values into
//! [`TenantSources`]; [`resolve_handle`] applies the precedence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::OrgId;

/// Body/form field carrying the tenant handle.
pub const ORG_USERNAME_FIELD: &str = "org_username";

/// Header carrying the tenant handle.
pub const TENANT_HEADER: &str = "tenant";

/// An organization, keyed by its unique human-readable handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub id: OrgId,
    pub org_username: String,
    pub org_name: String,
    pub org_email: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("org directory backend failure: {0}")]
    Backend(String),
}

/// Read access to organizations, used by the tenant resolver.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    async fn find_by_username(&self, org_username: &str) -> Result<Option<Org>, DirectoryError>;
}

/// Raw tenant-handle candidates taken from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSources {
    pub header: Option<String>,
    pub json_field: Option<String>,
    pub form_field: Option<String>,
    pub host: Option<String>,
}

impl TenantSources {
    /// True when a higher-priority source already yields a handle, so the
    /// body does not need to be decoded.
    pub fn has_header(&self) -> bool {
        non_empty(self.header.as_deref()).is_some()
    }
}

/// Pick the tenant handle; empty when no source yields one.
pub fn resolve_handle(sources: &TenantSources) -> String {
    non_empty(sources.header.as_deref())
        .or_else(|| non_empty(sources.json_field.as_deref()))
        .or_else(|| non_empty(sources.form_field.as_deref()))
        .or_else(|| sources.host.as_deref().and_then(subdomain))
        .unwrap_or_default()
        .to_string()
}

/// First label of a multi-label host, unless it is `www`. Any port is ignored.
pub fn subdomain(host: &str) -> Option<&str> {
    let host = host.split(':').next().unwrap_or(host);
    let mut labels = host.split('.');
    let first = labels.next()?;
    if labels.next().is_none() || first == "www" || first.is_empty() {
        return None;
    }
    Some(first)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
