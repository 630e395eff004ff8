//! User records and storage.

mod in_memory;
mod postgres;

use async_trait::async_trait;

use gatehouse_auth::Identity;
use gatehouse_core::{IdentityId, OrgId};

use crate::error::StoreError;

pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
pub(crate) use postgres::insert_user;

/// A stored user account.
///
/// Users sign in with their email, so `email` is what [`Identity::username`]
/// reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub org_id: Option<OrgId>,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub remember_token: Option<String>,
}

impl Identity for User {
    fn id(&self) -> IdentityId {
        IdentityId::from(self.id)
    }

    fn username(&self) -> &str {
        &self.email
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

/// Fields required to create a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub org_id: Option<OrgId>,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look a user up by email, restricted to `org_id` when given.
    async fn find_by_email(&self, org_id: Option<OrgId>, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with an `email` conflict when the email is
    /// already registered in the same org.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn set_remember_token(&self, user_id: u64, token: &str) -> Result<(), StoreError>;
}
