//! Creating an organization together with its first user.
//!
//! Either both records exist afterwards or neither does. Postgres runs the
//! two inserts in one transaction; [`StoreRegistrar`] removes the org again
//! when the user insert fails.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{instrument, warn};

use gatehouse_auth::Org;

use crate::error::StoreError;
use crate::orgs::{NewOrg, OrgRepository, insert_org};
use crate::users::{NewUser, User, UserStore, insert_user};

/// Records created by one registration.
#[derive(Debug, Clone)]
pub struct Registered {
    pub org: Org,
    pub user: User,
}

#[async_trait]
pub trait Registrar: Send + Sync {
    /// Create `org` and `owner` as one unit. `owner.org_id` is replaced with
    /// the new org's id.
    ///
    /// Conflicts surface as `org_username` or `email`.
    async fn register(&self, org: NewOrg, owner: NewUser) -> Result<Registered, StoreError>;
}

/// Registrar over separate org and user stores, compensating by hand.
pub struct StoreRegistrar {
    orgs: Arc<dyn OrgRepository>,
    users: Arc<dyn UserStore>,
}

impl StoreRegistrar {
    pub fn new(orgs: Arc<dyn OrgRepository>, users: Arc<dyn UserStore>) -> Self {
        Self { orgs, users }
    }
}

#[async_trait]
impl Registrar for StoreRegistrar {
    async fn register(&self, org: NewOrg, mut owner: NewUser) -> Result<Registered, StoreError> {
        let org = self.orgs.create(org).await?;
        owner.org_id = Some(org.id);

        match self.users.create(owner).await {
            Ok(user) => Ok(Registered { org, user }),
            Err(err) => {
                if let Err(undo) = self.orgs.remove(org.id).await {
                    warn!(org_id = %org.id, error = %undo, "failed to remove org after user insert failed");
                }
                Err(err)
            }
        }
    }
}

/// Registrar running both inserts in a single Postgres transaction.
#[derive(Debug, Clone)]
pub struct PostgresRegistrar {
    pool: PgPool,
}

impl PostgresRegistrar {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Registrar for PostgresRegistrar {
    #[instrument(skip(self, owner), fields(org_username = %org.org_username))]
    async fn register(&self, org: NewOrg, mut owner: NewUser) -> Result<Registered, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database("begin_registration", e))?;

        // Dropping `tx` on an early return rolls both inserts back.
        let org = insert_org(&mut *tx, &org).await?;
        owner.org_id = Some(org.id);
        let user = insert_user(&mut *tx, &owner).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::database("commit_registration", e))?;
        Ok(Registered { org, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryOrgStore, InMemoryUserStore};
    use gatehouse_auth::OrgDirectory;
    use gatehouse_core::OrgId;

    /// User store whose inserts always fail with a backend error.
    struct BrokenUsers;

    #[async_trait]
    impl UserStore for BrokenUsers {
        async fn find_by_email(&self, _: Option<OrgId>, _: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn create(&self, _: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Poisoned)
        }

        async fn set_remember_token(&self, _: u64, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn acme() -> NewOrg {
        NewOrg {
            org_username: "acme".to_string(),
            org_name: "Acme Inc".to_string(),
            org_email: "ops@acme.test".to_string(),
        }
    }

    fn owner(email: &str) -> NewUser {
        NewUser {
            org_id: None,
            email: email.to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn owner_is_attached_to_the_new_org() {
        let orgs = Arc::new(InMemoryOrgStore::new());
        let registrar = StoreRegistrar::new(orgs.clone(), Arc::new(InMemoryUserStore::new()));

        let registered = registrar.register(acme(), owner("alice@acme.test")).await.unwrap();

        assert_eq!(registered.user.org_id, Some(registered.org.id));
        assert!(orgs.find_by_username("acme").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_user_insert_releases_the_handle() {
        let orgs = Arc::new(InMemoryOrgStore::new());
        let broken = StoreRegistrar::new(orgs.clone(), Arc::new(BrokenUsers));

        let err = broken.register(acme(), owner("alice@acme.test")).await.unwrap_err();
        assert!(matches!(err, StoreError::Poisoned));
        assert!(orgs.find_by_username("acme").await.unwrap().is_none());

        // A retry against a healthy user store can claim the handle.
        let healthy = StoreRegistrar::new(orgs.clone(), Arc::new(InMemoryUserStore::new()));
        assert!(healthy.register(acme(), owner("alice@acme.test")).await.is_ok());
    }

    #[tokio::test]
    async fn taken_handle_creates_no_user() {
        let orgs = Arc::new(InMemoryOrgStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let registrar = StoreRegistrar::new(orgs.clone(), users.clone());
        registrar.register(acme(), owner("alice@acme.test")).await.unwrap();

        let err = registrar.register(acme(), owner("bob@acme.test")).await.unwrap_err();
        assert_eq!(err.conflict_field(), Some("org_username"));
        assert!(users.find_by_email(None, "bob@acme.test").await.unwrap().is_none());
    }
}
