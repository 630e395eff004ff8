use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use gatehouse_auth::{DirectoryError, Org, OrgDirectory};
use gatehouse_core::{DomainError, OrgId};

use super::{NewOrg, OrgRepository};
use crate::error::StoreError;

/// In-memory organization store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrgStore {
    inner: RwLock<OrgTable>,
}

#[derive(Debug, Default)]
struct OrgTable {
    by_username: HashMap<String, Org>,
    last_id: u64,
}

impl InMemoryOrgStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, org: NewOrg) -> Result<Org, StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if table.by_username.contains_key(&org.org_username) {
            return Err(DomainError::conflict("org_username").into());
        }

        table.last_id += 1;
        let created = Org {
            id: OrgId::new(table.last_id),
            org_username: org.org_username,
            org_name: org.org_name,
            org_email: org.org_email,
        };
        table
            .by_username
            .insert(created.org_username.clone(), created.clone());
        Ok(created)
    }

    /// Synchronous insert for seeding fixtures.
    pub fn seed(&self, org_username: &str) -> Result<Org, StoreError> {
        self.insert(NewOrg {
            org_username: org_username.to_string(),
            org_name: org_username.to_string(),
            org_email: format!("admin@{org_username}.test"),
        })
    }
}

#[async_trait]
impl OrgDirectory for InMemoryOrgStore {
    async fn find_by_username(&self, org_username: &str) -> Result<Option<Org>, DirectoryError> {
        let table = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(table.by_username.get(org_username).cloned())
    }
}

#[async_trait]
impl OrgRepository for InMemoryOrgStore {
    async fn create(&self, org: NewOrg) -> Result<Org, StoreError> {
        self.insert(org)
    }

    async fn remove(&self, id: OrgId) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        table.by_username.retain(|_, org| org.id != id);
        Ok(())
    }
}
