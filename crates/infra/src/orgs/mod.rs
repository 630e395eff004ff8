//! Organization storage.
//!
//! Both backends implement [`OrgDirectory`](gatehouse_auth::OrgDirectory)
//! (lookup by handle, used by the tenant resolver) and [`OrgRepository`]
//! (creation, used by registration).

mod in_memory;
mod postgres;

use async_trait::async_trait;
use serde::Deserialize;

use gatehouse_auth::Org;
use gatehouse_core::OrgId;

use crate::error::StoreError;

pub use in_memory::InMemoryOrgStore;
pub use postgres::PostgresOrgStore;
pub(crate) use postgres::insert_org;

/// Fields required to create an organization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrg {
    pub org_username: String,
    pub org_name: String,
    pub org_email: String,
}

#[async_trait]
pub trait OrgRepository: Send + Sync {
    /// Insert a new organization.
    ///
    /// Fails with a `org_username` conflict when the handle is taken.
    async fn create(&self, org: NewOrg) -> Result<Org, StoreError>;

    /// Delete an organization; a missing id is not an error.
    async fn remove(&self, id: OrgId) -> Result<(), StoreError>;
}
