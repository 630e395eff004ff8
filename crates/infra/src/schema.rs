//! Schema bootstrap for the Postgres backends.

use sqlx::PgPool;
use tracing::info;

use crate::error::StoreError;

const INIT: &str = include_str!("../migrations/0001_orgs_users.sql");

/// Create the `orgs` and `users` tables when missing. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(INIT)
        .execute(pool)
        .await
        .map_err(|e| StoreError::database("ensure_schema", e))?;
    info!("database schema ready");
    Ok(())
}
