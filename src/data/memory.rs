//! In-process client data store.
//!
//! DESIGN
//! ======
//! One record per account behind a `RwLock`. The default backend when no
//! `DATABASE_URL` is configured, and the store every unit test runs on.
//! Sets are `BTreeSet` so block and friend listings come out sorted for
//! free.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ClientData, DataError, hash_password, validate_name, verify_password};

#[derive(Debug, Clone)]
struct ClientRecord {
    password: String,
    last_online: DateTime<Utc>,
    blocked: BTreeSet<String>,
    friends: BTreeSet<String>,
}

/// Shared account table. One per process, handed to every `MemoryData`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ClientRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-account handle over the shared store.
#[derive(Debug)]
pub struct MemoryData {
    store: Arc<MemoryStore>,
    name: Mutex<String>,
    disable_new_accounts: bool,
}

impl MemoryData {
    #[must_use]
    pub fn new(store: Arc<MemoryStore>, name: &str, disable_new_accounts: bool) -> Self {
        Self { store, name: Mutex::new(name.to_owned()), disable_new_accounts }
    }

    fn bound_name(&self) -> String {
        self.name.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientData for MemoryData {
    async fn authenticate(&self, password: &str) -> Result<bool, DataError> {
        let records = self.store.records.read().unwrap();
        Ok(records
            .get(&self.bound_name())
            .is_some_and(|r| verify_password(password, &r.password)))
    }

    async fn client_exists(&self, name: &str) -> Result<bool, DataError> {
        Ok(self.store.records.read().unwrap().contains_key(name))
    }

    async fn new_client(&self, password: &str) -> Result<(), DataError> {
        if self.disable_new_accounts {
            return Err(DataError::AccountCreationDisabled);
        }
        let name = self.bound_name();
        if !validate_name(&name) {
            return Err(DataError::InvalidName);
        }
        let hash = hash_password(password)?;
        let mut records = self.store.records.write().unwrap();
        if records.contains_key(&name) {
            return Err(DataError::ClientExists);
        }
        records.insert(name, ClientRecord {
            password: hash,
            last_online: Utc::now(),
            blocked: BTreeSet::new(),
            friends: BTreeSet::new(),
        });
        Ok(())
    }

    async fn last_online(&self, name: &str) -> Result<DateTime<Utc>, DataError> {
        self.store
            .records
            .read()
            .unwrap()
            .get(name)
            .map(|r| r.last_online)
            .ok_or(DataError::ClientNotFound)
    }

    async fn update_online(&self, t: DateTime<Utc>) -> Result<(), DataError> {
        if let Some(record) = self.store.records.write().unwrap().get_mut(&self.bound_name()) {
            record.last_online = t;
        }
        Ok(())
    }

    async fn is_blocked(&self, name: &str) -> Result<bool, DataError> {
        let records = self.store.records.read().unwrap();
        Ok(records
            .get(&self.bound_name())
            .is_some_and(|r| r.blocked.contains(name)))
    }

    async fn block_list(&self) -> Result<Vec<String>, DataError> {
        let records = self.store.records.read().unwrap();
        Ok(records
            .get(&self.bound_name())
            .map(|r| r.blocked.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn block(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let mut records = self.store.records.write().unwrap();
        let record = records
            .get_mut(&self.bound_name())
            .ok_or(DataError::ClientNotFound)?;
        if !record.blocked.insert(name.to_owned()) {
            return Err(DataError::AlreadyBlocking);
        }
        Ok(())
    }

    async fn unblock(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let mut records = self.store.records.write().unwrap();
        let record = records
            .get_mut(&self.bound_name())
            .ok_or(DataError::ClientNotFound)?;
        if !record.blocked.remove(name) {
            return Err(DataError::NotBlocking);
        }
        Ok(())
    }

    async fn is_friend(&self, name: &str) -> Result<bool, DataError> {
        let records = self.store.records.read().unwrap();
        Ok(records
            .get(&self.bound_name())
            .is_some_and(|r| r.friends.contains(name)))
    }

    async fn friend(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let mut records = self.store.records.write().unwrap();
        let record = records
            .get_mut(&self.bound_name())
            .ok_or(DataError::ClientNotFound)?;
        if !record.friends.insert(name.to_owned()) {
            return Err(DataError::AlreadyFriend);
        }
        Ok(())
    }

    async fn unfriend(&self, name: &str) -> Result<(), DataError> {
        if !validate_name(name) {
            return Err(DataError::InvalidName);
        }
        let mut records = self.store.records.write().unwrap();
        let record = records
            .get_mut(&self.bound_name())
            .ok_or(DataError::ClientNotFound)?;
        if !record.friends.remove(name) {
            return Err(DataError::NotFriend);
        }
        Ok(())
    }

    async fn friend_list(&self) -> Result<Vec<String>, DataError> {
        let records = self.store.records.read().unwrap();
        Ok(records
            .get(&self.bound_name())
            .map(|r| r.friends.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn set_name(&self, name: &str) {
        if validate_name(name) {
            *self.name.lock().unwrap() = name.to_owned();
        }
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
