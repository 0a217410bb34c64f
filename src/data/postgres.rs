//! PostgreSQL client data store.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup uses `init_pool` to create the shared SQLx pool and run schema
//! migrations before any listener accepts traffic. Per-login handles share
//! the pool. The block check runs on every message delivered to the
//! account, so these queries stay single-row and indexed.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;
use sqlx::postgres::PgPoolOptions;

use super::{ClientData, DataError, hash_password, validate_name, verify_password};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Connect the shared pool and bring the schema up to date. The pool is
/// sized from `DB_MAX_CONNECTIONS`; every per-login handle borrows from it.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(crate::env_parse("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS))
        .connect(database_url)
        .await?;
    sqlx::migrate!("src/data/migrations").run(&pool).await?;
    Ok(pool)
}

/// Per-account handle over the shared pool.
#[derive(Debug)]
pub struct PostgresData {
    pool: PgPool,
    name: Mutex<String>,
    disable_new_accounts: bool,
}

impl PostgresData {
    #[must_use]
    pub fn new(pool: PgPool, name: &str, disable_new_accounts: bool) -> Self {
        Self { pool, name: Mutex::new(name.to_owned()), disable_new_accounts }
    }

    fn bound_name(&self) -> String {
        self.name.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientData for PostgresData {
    async fn authenticate(&self, password: &str) -> Result<bool, DataError> {
        let row = sqlx::query("SELECT password FROM clients WHERE name = $1")
            .bind(self.bound_name())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some_and(|r| verify_password(password, r.get("password"))))
    }

    async fn client_exists(&self, name: &str) -> Result<bool, DataError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn new_client(&self, password: &str) -> Result<(), DataError> {
        if self.disable_new_accounts {
            return Err(DataError::AccountCreationDisabled);
        }
        let name = self.bound_name();
        if !validate_name(&name) {
            return Err(DataError::InvalidName);
        }
        if self.client_exists(&name).await? {
            return Err(DataError::ClientExists);
        }
        let hash = hash_password(password)?;
        sqlx::query("INSERT INTO clients (name, password, lastonline) VALUES ($1, $2, now())")
            .bind(&name)
            .bind(&hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_online(&self, name: &str) -> Result<DateTime<Utc>, DataError> {
        let row = sqlx::query("SELECT lastonline FROM clients WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.get("lastonline"))
            .ok_or(DataError::ClientNotFound)
    }

    async fn update_online(&self, t: DateTime<Utc>) -> Result<(), DataError> {
        sqlx::query("UPDATE clients SET lastonline = $1 WHERE name = $2")
            .bind(t)
            .bind(self.bound_name())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_blocked(&self, name: &str) -> Result<bool, DataError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM blocked WHERE name = $1 AND blocked = $2)",
        )
        .bind(self.bound_name())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn block_list(&self) -> Result<Vec<String>, DataError> {
        let list = sqlx::query_scalar("SELECT blocked FROM blocked WHERE name = $1 ORDER BY blocked")
            .bind(self.bound_name())
            .fetch_all(&self.pool)
            .await?;
        Ok(list)
    }

    async fn block(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        if self.is_blocked(name).await? {
            return Err(DataError::AlreadyBlocking);
        }
        sqlx::query("INSERT INTO blocked (name, blocked) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(self.bound_name())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unblock(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let result = sqlx::query("DELETE FROM blocked WHERE name = $1 AND blocked = $2")
            .bind(self.bound_name())
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotBlocking);
        }
        Ok(())
    }

    async fn is_friend(&self, name: &str) -> Result<bool, DataError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM friends WHERE name = $1 AND friend = $2)",
        )
        .bind(self.bound_name())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn friend(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        if self.is_friend(name).await? {
            return Err(DataError::AlreadyFriend);
        }
        sqlx::query("INSERT INTO friends (name, friend) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(self.bound_name())
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unfriend(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let result = sqlx::query("DELETE FROM friends WHERE name = $1 AND friend = $2")
            .bind(self.bound_name())
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DataError::NotFriend);
        }
        Ok(())
    }

    async fn friend_list(&self) -> Result<Vec<String>, DataError> {
        let list = sqlx::query_scalar("SELECT friend FROM friends WHERE name = $1 ORDER BY friend")
            .bind(self.bound_name())
            .fetch_all(&self.pool)
            .await?;
        Ok(list)
    }

    fn set_name(&self, name: &str) {
        if validate_name(name) {
            *self.name.lock().unwrap() = name.to_owned();
        }
    }
}
