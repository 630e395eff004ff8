use std::sync::RwLock;

use async_trait::async_trait;

use gatehouse_core::{DomainError, OrgId};

use super::{NewUser, User, UserStore};
use crate::error::StoreError;

/// In-memory user store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if users
            .iter()
            .any(|u| u.org_id == user.org_id && u.email == user.email)
        {
            return Err(DomainError::conflict("email").into());
        }

        let created = User {
            id: users.len() as u64 + 1,
            org_id: user.org_id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            remember_token: None,
        };
        users.push(created.clone());
        Ok(created)
    }

    /// Synchronous insert for seeding fixtures.
    pub fn seed(&self, user: NewUser) -> Result<User, StoreError> {
        self.insert(user)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, org_id: Option<OrgId>, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(users
            .iter()
            .find(|u| u.email == email && org_id.is_none_or(|org| u.org_id == Some(org)))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.insert(user)
    }

    async fn set_remember_token(&self, user_id: u64, token: &str) -> Result<(), StoreError> {
        let mut users = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(user) = users.iter_mut().find(|u| u.id == user_id) {
            user.remember_token = Some(token.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_auth::Identity;

    fn new_user(org: u64, email: &str) -> NewUser {
        NewUser {
            org_id: Some(OrgId::new(org)),
            email: email.to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn lookup_is_scoped_by_org() {
        let store = InMemoryUserStore::new();
        store.create(new_user(1, "alice@example.com")).await.unwrap();

        let acme = store
            .find_by_email(Some(OrgId::new(1)), "alice@example.com")
            .await
            .unwrap();
        assert!(acme.is_some());

        let other = store
            .find_by_email(Some(OrgId::new(2)), "alice@example.com")
            .await
            .unwrap();
        assert!(other.is_none());

        let any = store.find_by_email(None, "alice@example.com").await.unwrap();
        assert_eq!(any.unwrap().username(), "alice@example.com");
    }

    #[tokio::test]
    async fn email_is_unique_per_org() {
        let store = InMemoryUserStore::new();
        store.create(new_user(1, "a@x.test")).await.unwrap();

        let err = store.create(new_user(1, "a@x.test")).await.unwrap_err();
        assert_eq!(err.conflict_field(), Some("email"));
        assert!(store.create(new_user(2, "a@x.test")).await.is_ok());
    }

    #[tokio::test]
    async fn remember_token_is_recorded() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user(1, "a@x.test")).await.unwrap();

        store.set_remember_token(user.id, "tok").await.unwrap();

        let user = store.find_by_email(None, "a@x.test").await.unwrap().unwrap();
        assert_eq!(user.remember_token.as_deref(), Some("tok"));
        assert_eq!(user.id().as_str(), "1");
    }
}
