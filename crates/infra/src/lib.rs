//! Infrastructure adapters: org directory and user store backends
//! (in-memory for dev/tests, Postgres for deployments).

pub mod error;
pub mod orgs;
pub mod registration;
pub mod schema;
pub mod users;

pub use error::StoreError;
pub use orgs::{InMemoryOrgStore, NewOrg, OrgRepository, PostgresOrgStore};
pub use registration::{PostgresRegistrar, Registered, Registrar, StoreRegistrar};
pub use users::{InMemoryUserStore, NewUser, PostgresUserStore, User, UserStore};
