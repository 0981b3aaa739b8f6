use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{RevocationRecord, RevocationStore, UserStore};
use crate::error::AppError;
use crate::user::User;

fn poisoned(what: &str) -> AppError {
    AppError::Internal(format!("{} lock poisoned", what))
}

/// User records held in process memory
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<i64, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record
    pub fn insert(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.write().map_err(|_| poisoned("user store"))?;
        users.insert(user.id, user);
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let users = self.users.read().map_err(|_| poisoned("user store"))?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Vec<User>, AppError> {
        let users = self.users.read().map_err(|_| poisoned("user store"))?;
        let wanted = identifier.to_lowercase();
        let mut matches: Vec<User> = users
            .values()
            .filter(|u| u.username.to_lowercase() == wanted || u.email.to_lowercase() == wanted)
            .cloned()
            .collect();
        matches.sort_by_key(|u| u.id);
        Ok(matches)
    }
}

/// Revocation records held in process memory
///
/// All mutations of one jti happen under a single write lock, so concurrent
/// logouts of the same token serialise and the first one wins.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    records: RwLock<HashMap<String, RevocationRecord>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn record(&self, record: RevocationRecord) -> Result<bool, AppError> {
        let mut records = self.records.write().map_err(|_| poisoned("revocation store"))?;
        if records.contains_key(&record.jti) {
            return Ok(false);
        }
        records.insert(record.jti.clone(), record);
        Ok(true)
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let records = self.records.read().map_err(|_| poisoned("revocation store"))?;
        Ok(records.contains_key(jti))
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, AppError> {
        let mut records = self.records.write().map_err(|_| poisoned("revocation store"))?;
        let before = records.len();
        records.retain(|_, r| r.expires_at >= now);
        Ok((before - records.len()) as u64)
    }
}
