//! `gatehouse-core` — shared primitives (no HTTP, no storage).

pub mod error;
pub mod id;
pub mod validation;

pub use error::{DomainError, DomainResult};
pub use id::{IdentityId, OrgId};
pub use validation::ValidationErrors;
