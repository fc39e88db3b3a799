//! Persistence contract consumed by every engine.
//!
//! Engines only ever talk to `dyn Repository`; the memory and SQL adapters
//! are interchangeable. Expiry is *not* filtered here: the engines check
//! [`Expiring::is_expired_at`] on every read and [`Repository::purge_expired`]
//! is housekeeping only.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

mod housekeeping;
mod memory;
pub mod models;
mod sql;

pub use housekeeping::{purge_once, spawn_housekeeping};
pub use memory::MemoryRepository;
pub use models::{
    ClientApplication, Expiring, PendingUserAccount, ResponseType, Token, TokenKind, UserAccount,
};
pub use sql::SqlRepository;

/// Page size for the administrative listings.
pub const PAGE_SIZE: u64 = 10;

/// One page of an administrative listing; pages are numbered from 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field (`users.email`, `pending_users.email`, `clients.name`,
    /// or an id) is already taken.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_user(&self, user: UserAccount) -> StoreResult<String>;
    async fn find_user(&self, id: &str) -> StoreResult<Option<UserAccount>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>>;
    /// Returns the number of modified records.
    async fn update_user(&self, user: &UserAccount) -> StoreResult<u64>;
    async fn delete_user(&self, id: &str) -> StoreResult<()>;
    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Vec<UserAccount>>;
    async fn count_users(&self) -> StoreResult<u64>;

    async fn create_pending(&self, pending: PendingUserAccount) -> StoreResult<String>;
    async fn find_pending(&self, id: &str) -> StoreResult<Option<PendingUserAccount>>;
    async fn find_pending_by_email(&self, email: &str)
    -> StoreResult<Option<PendingUserAccount>>;
    async fn delete_pending(&self, id: &str) -> StoreResult<()>;

    async fn create_client(&self, client: ClientApplication) -> StoreResult<String>;
    async fn find_client(&self, id: &str) -> StoreResult<Option<ClientApplication>>;
    async fn find_client_by_name(&self, name: &str) -> StoreResult<Option<ClientApplication>>;
    async fn delete_client(&self, id: &str) -> StoreResult<()>;
    async fn list_clients(&self, offset: u64, limit: u64) -> StoreResult<Vec<ClientApplication>>;
    async fn count_clients(&self) -> StoreResult<u64>;

    async fn create_token(&self, kind: TokenKind, token: Token) -> StoreResult<String>;
    async fn find_token(&self, kind: TokenKind, id: &str) -> StoreResult<Option<Token>>;
    async fn delete_token(&self, kind: TokenKind, id: &str) -> StoreResult<()>;

    /// Removes pending sign-ups, clients and tokens whose lifetime ended
    /// before `now`. Returns the number of removed records.
    async fn purge_expired(&self, now: OffsetDateTime) -> StoreResult<u64>;
}
