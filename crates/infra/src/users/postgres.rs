//! Postgres-backed user store.

use async_trait::async_trait;
use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use gatehouse_core::{DomainError, OrgId};

use super::{NewUser, User, UserStore};
use crate::error::{StoreError, is_unique_violation};

const USER_COLUMNS: &str =
    "id, org_id, email, username, first_name, last_name, password, remember_token";

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let org_id: Option<i64> = row.try_get("org_id")?;
    Ok(User {
        id: id as u64,
        org_id: org_id.map(|id| OrgId::new(id as u64)),
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        password_hash: row.try_get("password")?,
        remember_token: row.try_get("remember_token")?,
    })
}

/// Insert a user through any executor (pool or open transaction).
pub(crate) async fn insert_user<'e>(exec: impl PgExecutor<'e>, user: &NewUser) -> Result<User, StoreError> {
    let sql = format!(
        "INSERT INTO users (org_id, email, username, first_name, last_name, password) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(user.org_id.map(|id| id.get() as i64))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .fetch_one(exec)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::from(DomainError::conflict("email"))
            } else {
                StoreError::database("insert_user", e)
            }
        })?;

    user_from_row(&row).map_err(|e| StoreError::database("decode_user", e))
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self))]
    async fn find_by_email(&self, org_id: Option<OrgId>, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email = $1 AND ($2::BIGINT IS NULL OR org_id = $2) \
             ORDER BY id LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(email)
            .bind(org_id.map(|id| id.get() as i64))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database("find_user", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| StoreError::database("decode_user", e))
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        insert_user(&self.pool, &user).await
    }

    #[instrument(skip(self, token))]
    async fn set_remember_token(&self, user_id: u64, token: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET remember_token = $1 WHERE id = $2")
            .bind(token)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("set_remember_token", e))?;
        Ok(())
    }
}
