use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::models::{
    ClientApplication, Expiring, PendingUserAccount, Token, TokenKind, UserAccount,
};
use super::{Repository, StoreError, StoreResult};

/// Process-local repository. Used by the test-suite and by
/// `database_url: memory` deployments.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<String, UserAccount>>,
    pending: RwLock<HashMap<String, PendingUserAccount>>,
    clients: RwLock<HashMap<String, ClientApplication>>,
    tokens: RwLock<HashMap<(TokenKind, String), Token>>,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
}

fn page<T: Clone>(
    mut rows: Vec<T>,
    key: impl Fn(&T) -> (OffsetDateTime, String),
    offset: u64,
    limit: u64,
) -> Vec<T> {
    rows.sort_by_key(key);
    rows.into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records of one token kind, expired or not.
    pub fn token_count(&self, kind: TokenKind) -> usize {
        read(&self.tokens)
            .map(|tokens| tokens.keys().filter(|(k, _)| *k == kind).count())
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        read(&self.pending).map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: UserAccount) -> StoreResult<String> {
        let mut users = write(&self.users)?;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users.email".to_string()));
        }
        let id = user.id.clone();
        users.insert(id.clone(), user);
        Ok(id)
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        Ok(read(&self.users)?.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>> {
        Ok(read(&self.users)?
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &UserAccount) -> StoreResult<u64> {
        let mut users = write(&self.users)?;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StoreError::Conflict("users.email".to_string()));
        }
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        write(&self.users)?.remove(id);
        Ok(())
    }

    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Vec<UserAccount>> {
        let rows = read(&self.users)?.values().cloned().collect();
        Ok(page(rows, |u| (u.created_at, u.id.clone()), offset, limit))
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(read(&self.users)?.len() as u64)
    }

    async fn create_pending(&self, pending: PendingUserAccount) -> StoreResult<String> {
        let mut all = write(&self.pending)?;
        if all.contains_key(&pending.id) || all.values().any(|p| p.email == pending.email) {
            return Err(StoreError::Conflict("pending_users.email".to_string()));
        }
        let id = pending.id.clone();
        all.insert(id.clone(), pending);
        Ok(id)
    }

    async fn find_pending(&self, id: &str) -> StoreResult<Option<PendingUserAccount>> {
        Ok(read(&self.pending)?.get(id).cloned())
    }

    async fn find_pending_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<PendingUserAccount>> {
        Ok(read(&self.pending)?
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn delete_pending(&self, id: &str) -> StoreResult<()> {
        write(&self.pending)?.remove(id);
        Ok(())
    }

    async fn create_client(&self, client: ClientApplication) -> StoreResult<String> {
        let mut clients = write(&self.clients)?;
        if clients.contains_key(&client.id) || clients.values().any(|c| c.name == client.name) {
            return Err(StoreError::Conflict("clients.name".to_string()));
        }
        let id = client.id.clone();
        clients.insert(id.clone(), client);
        Ok(id)
    }

    async fn find_client(&self, id: &str) -> StoreResult<Option<ClientApplication>> {
        Ok(read(&self.clients)?.get(id).cloned())
    }

    async fn find_client_by_name(&self, name: &str) -> StoreResult<Option<ClientApplication>> {
        Ok(read(&self.clients)?
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        write(&self.clients)?.remove(id);
        Ok(())
    }

    async fn list_clients(&self, offset: u64, limit: u64) -> StoreResult<Vec<ClientApplication>> {
        let rows = read(&self.clients)?.values().cloned().collect();
        Ok(page(rows, |c| (c.created_at, c.id.clone()), offset, limit))
    }

    async fn count_clients(&self) -> StoreResult<u64> {
        Ok(read(&self.clients)?.len() as u64)
    }

    async fn create_token(&self, kind: TokenKind, token: Token) -> StoreResult<String> {
        let mut tokens = write(&self.tokens)?;
        let key = (kind, token.id.clone());
        if tokens.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{kind} id")));
        }
        let id = token.id.clone();
        tokens.insert(key, token);
        Ok(id)
    }

    async fn find_token(&self, kind: TokenKind, id: &str) -> StoreResult<Option<Token>> {
        Ok(read(&self.tokens)?.get(&(kind, id.to_string())).cloned())
    }

    async fn delete_token(&self, kind: TokenKind, id: &str) -> StoreResult<()> {
        write(&self.tokens)?.remove(&(kind, id.to_string()));
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut removed = 0;
        {
            let mut pending = write(&self.pending)?;
            let before = pending.len();
            pending.retain(|_, p| !p.is_expired_at(now));
            removed += before - pending.len();
        }
        {
            let mut clients = write(&self.clients)?;
            let before = clients.len();
            clients.retain(|_, c| !c.is_expired_at(now));
            removed += before - clients.len();
        }
        {
            let mut tokens = write(&self.tokens)?;
            let before = tokens.len();
            tokens.retain(|_, t| !t.is_expired_at(now));
            removed += before - tokens.len();
        }
        Ok(removed as u64)
    }
}
