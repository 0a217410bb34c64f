//! Client data — per-account credentials and social state.
//!
//! ARCHITECTURE
//! ============
//! A `ClientData` handle is bound to one account name and mediates every
//! read and write of that account's persistent state: password, last-online
//! timestamp, block list, friend list. Two backends implement it — an
//! in-process memory store (the default, and the test double) and a
//! PostgreSQL store. `DataFactory` picks the backend once at startup and
//! mints handles per login.
//!
//! ERROR HANDLING
//! ==============
//! Semantic outcomes (already blocking, not a friend, account exists…) are
//! typed variants that the command engine maps to numeric response codes.
//! Infrastructure failures surface as `Database`/`Hash` and become code 50.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("a client with that name already exists")]
    ClientExists,
    #[error("you are not blocking them")]
    NotBlocking,
    #[error("client not found")]
    ClientNotFound,
    #[error("invalid name")]
    InvalidName,
    #[error("you are already blocking them")]
    AlreadyBlocking,
    #[error("they are already on your friends list")]
    AlreadyFriend,
    #[error("they are not on your friends list")]
    NotFriend,
    #[error("new account creation has been disabled")]
    AccountCreationDisabled,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// A name is valid iff non-empty and strictly alphanumeric. Applied to
/// account names and room names alike.
#[must_use]
pub fn validate_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Bcrypt cost used for stored passwords.
const HASH_COST: u32 = 12;

pub(crate) fn hash_password(password: &str) -> Result<String, DataError> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Persistent state of one account, as seen by that account's session.
#[async_trait]
pub trait ClientData: Send + Sync + std::fmt::Debug {
    /// Whether `password` matches the bound account's stored password.
    /// An unknown account authenticates as `false`, not as an error.
    async fn authenticate(&self, password: &str) -> Result<bool, DataError>;

    async fn client_exists(&self, name: &str) -> Result<bool, DataError>;

    /// Create the bound account with the given password.
    async fn new_client(&self, password: &str) -> Result<(), DataError>;

    async fn last_online(&self, name: &str) -> Result<DateTime<Utc>, DataError>;

    /// Stamp the bound account's last-online time.
    async fn update_online(&self, t: DateTime<Utc>) -> Result<(), DataError>;

    async fn is_blocked(&self, name: &str) -> Result<bool, DataError>;
    async fn block_list(&self) -> Result<Vec<String>, DataError>;
    async fn block(&self, name: &str) -> Result<(), DataError>;
    async fn unblock(&self, name: &str) -> Result<(), DataError>;

    async fn is_friend(&self, name: &str) -> Result<bool, DataError>;
    async fn friend(&self, name: &str) -> Result<(), DataError>;
    async fn unfriend(&self, name: &str) -> Result<(), DataError>;
    async fn friend_list(&self) -> Result<Vec<String>, DataError>;

    /// Rebind the handle to another account name. Invalid names are ignored.
    fn set_name(&self, name: &str);
}

// =============================================================================
// FACTORY
// =============================================================================

/// Process-wide backend selector. Mints one `ClientData` handle per login.
#[derive(Clone)]
pub struct DataFactory {
    backend: Backend,
    disable_new_accounts: bool,
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<memory::MemoryStore>),
    Postgres(PgPool),
}

impl DataFactory {
    #[must_use]
    pub fn memory(disable_new_accounts: bool) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(memory::MemoryStore::new())),
            disable_new_accounts,
        }
    }

    #[must_use]
    pub fn postgres(pool: PgPool, disable_new_accounts: bool) -> Self {
        Self { backend: Backend::Postgres(pool), disable_new_accounts }
    }

    pub fn create(&self, name: &str) -> Arc<dyn ClientData> {
        match &self.backend {
            Backend::Memory(store) => Arc::new(memory::MemoryData::new(
                Arc::clone(store),
                name,
                self.disable_new_accounts,
            )),
            Backend::Postgres(pool) => Arc::new(postgres::PostgresData::new(
                pool.clone(),
                name,
                self.disable_new_accounts,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_accepts_alphanumerics() {
        assert!(validate_name("Alice"));
        assert!(validate_name("room42"));
        assert!(validate_name("X"));
    }

    #[test]
    fn validate_name_rejects_empty_and_symbols() {
        assert!(!validate_name(""));
        assert!(!validate_name("with space"));
        assert!(!validate_name("semi;colon"));
        assert!(!validate_name("tab\there"));
        assert!(!validate_name("naïve"));
        assert!(!validate_name("/new"));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }
}
