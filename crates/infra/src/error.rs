use thiserror::Error;

use gatehouse_auth::DirectoryError;
use gatehouse_core::DomainError;

/// Store failures.
///
/// Uniqueness violations surface as [`DomainError::Conflict`] carrying the
/// offending field, so callers can turn them into field-level validation
/// errors; everything else is a backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    /// Field name when this is a uniqueness conflict.
    pub fn conflict_field(&self) -> Option<&str> {
        match self {
            Self::Domain(DomainError::Conflict(field)) => Some(field),
            _ => None,
        }
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        DirectoryError::Backend(err.to_string())
    }
}

/// Postgres `unique_violation`.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
