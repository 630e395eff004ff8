//! Postgres-backed organization store.
//!
//! | SQLx error | Postgres code | result |
//! |------------|---------------|--------|
//! | unique violation | `23505` | `Conflict("org_username")` |
//! | anything else | any | `StoreError::Database` |
//!
//! `insert_org` also runs inside the registration transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use gatehouse_auth::{DirectoryError, Org, OrgDirectory};
use gatehouse_core::{DomainError, OrgId};

use super::{NewOrg, OrgRepository};
use crate::error::{StoreError, is_unique_violation};

#[derive(Debug, Clone)]
pub struct PostgresOrgStore {
    pool: PgPool,
}

impl PostgresOrgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn org_from_row(row: &PgRow) -> Result<Org, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    Ok(Org {
        id: OrgId::new(id as u64),
        org_username: row.try_get("org_username")?,
        org_name: row.try_get("org_name")?,
        org_email: row.try_get("org_email")?,
    })
}

#[async_trait]
impl OrgDirectory for PostgresOrgStore {
    #[instrument(skip(self))]
    async fn find_by_username(&self, org_username: &str) -> Result<Option<Org>, DirectoryError> {
        let row = sqlx::query(
            "SELECT id, org_username, org_name, org_email FROM orgs WHERE org_username = $1 LIMIT 1",
        )
        .bind(org_username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database("find_org", e))?;

        row.as_ref()
            .map(org_from_row)
            .transpose()
            .map_err(|e| StoreError::database("decode_org", e).into())
    }
}

/// Insert an org through any executor (pool or open transaction).
pub(crate) async fn insert_org<'e>(exec: impl PgExecutor<'e>, org: &NewOrg) -> Result<Org, StoreError> {
    let row = sqlx::query(
        "INSERT INTO orgs (org_username, org_name, org_email) VALUES ($1, $2, $3) \
         RETURNING id, org_username, org_name, org_email",
    )
    .bind(&org.org_username)
    .bind(&org.org_name)
    .bind(&org.org_email)
    .fetch_one(exec)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::from(DomainError::conflict("org_username"))
        } else {
            StoreError::database("insert_org", e)
        }
    })?;

    org_from_row(&row).map_err(|e| StoreError::database("decode_org", e))
}

#[async_trait]
impl OrgRepository for PostgresOrgStore {
    #[instrument(skip(self), fields(org_username = %org.org_username))]
    async fn create(&self, org: NewOrg) -> Result<Org, StoreError> {
        insert_org(&self.pool, &org).await
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: OrgId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM orgs WHERE id = $1")
            .bind(id.get() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("delete_org", e))?;
        Ok(())
    }
}
