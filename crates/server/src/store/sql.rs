use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use time::OffsetDateTime;

use super::models::{
    ClientApplication, Expiring, PendingUserAccount, Token, TokenKind, UserAccount, join_set,
    parse_set,
};
use super::{Repository, StoreError, StoreResult};
use crate::entity::{clients, pending_users, users};

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => StoreError::Conflict(detail),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Runs `$body` with `$entity` bound to the module of the table that holds
/// tokens of `$kind`.
macro_rules! with_token_table {
    ($kind:expr, $entity:ident => $body:expr) => {
        match $kind {
            TokenKind::AuthorizationCode => {
                use crate::entity::authorization_codes as $entity;
                $body
            }
            TokenKind::AccessToken => {
                use crate::entity::access_tokens as $entity;
                $body
            }
            TokenKind::RefreshToken => {
                use crate::entity::refresh_tokens as $entity;
                $body
            }
        }
    };
}

/// SeaORM-backed repository for Postgres and SQLite.
#[derive(Clone, Debug)]
pub struct SqlRepository {
    db: Arc<DatabaseConnection>,
}

impl SqlRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn user_from_row(row: users::Model) -> UserAccount {
    UserAccount {
        id: row.id,
        email: row.email,
        password_hash: row.password_hash,
        first_name: row.first_name,
        last_name: row.last_name,
        realms: parse_set(&row.realms),
        created_at: row.created_at,
    }
}

fn user_to_row(user: &UserAccount) -> users::ActiveModel {
    users::ActiveModel {
        id: Set(user.id.clone()),
        email: Set(user.email.clone()),
        password_hash: Set(user.password_hash.clone()),
        first_name: Set(user.first_name.clone()),
        last_name: Set(user.last_name.clone()),
        realms: Set(join_set(&user.realms)),
        created_at: Set(user.created_at),
    }
}

fn pending_from_row(row: pending_users::Model) -> PendingUserAccount {
    PendingUserAccount {
        id: row.id.clone(),
        email: row.email.clone(),
        user: UserAccount {
            id: String::new(),
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            realms: parse_set(&row.realms),
            created_at: row.created_at,
        },
        created_at: row.created_at,
        ttl: row.ttl,
    }
}

fn client_from_row(row: clients::Model) -> StoreResult<ClientApplication> {
    let response_type = row.response_type.parse().map_err(|_| {
        StoreError::Backend(format!(
            "client {} has unknown response type `{}`",
            row.id, row.response_type
        ))
    })?;
    Ok(ClientApplication {
        id: row.id,
        name: row.name,
        description: row.description,
        response_type,
        redirect_uri: row.redirect_uri,
        scope: parse_set(&row.scope),
        owner: row.owner,
        secret_hash: row.secret_hash,
        created_at: row.created_at,
        ttl: row.ttl,
    })
}

#[async_trait]
impl Repository for SqlRepository {
    async fn create_user(&self, user: UserAccount) -> StoreResult<String> {
        users::Entity::insert(user_to_row(&user))
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(user.id)
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        Ok(users::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(user_from_row))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?
            .map(user_from_row))
    }

    async fn update_user(&self, user: &UserAccount) -> StoreResult<u64> {
        let result = users::Entity::update_many()
            .set(user_to_row(user))
            .filter(users::Column::Id.eq(user.id.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_user(&self, id: &str) -> StoreResult<()> {
        users::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn list_users(&self, offset: u64, limit: u64) -> StoreResult<Vec<UserAccount>> {
        let rows = users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(users::Entity::find().count(self.db.as_ref()).await?)
    }

    async fn create_pending(&self, pending: PendingUserAccount) -> StoreResult<String> {
        let row = pending_users::ActiveModel {
            id: Set(pending.id.clone()),
            email: Set(pending.email.clone()),
            password_hash: Set(pending.user.password_hash.clone()),
            first_name: Set(pending.user.first_name.clone()),
            last_name: Set(pending.user.last_name.clone()),
            realms: Set(join_set(&pending.user.realms)),
            created_at: Set(pending.created_at),
            ttl: Set(pending.ttl),
            expires_at: Set(pending.expires_at()),
        };
        pending_users::Entity::insert(row)
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(pending.id)
    }

    async fn find_pending(&self, id: &str) -> StoreResult<Option<PendingUserAccount>> {
        Ok(pending_users::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(pending_from_row))
    }

    async fn find_pending_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<PendingUserAccount>> {
        Ok(pending_users::Entity::find()
            .filter(pending_users::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?
            .map(pending_from_row))
    }

    async fn delete_pending(&self, id: &str) -> StoreResult<()> {
        pending_users::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn create_client(&self, client: ClientApplication) -> StoreResult<String> {
        let row = clients::ActiveModel {
            id: Set(client.id.clone()),
            name: Set(client.name.clone()),
            description: Set(client.description.clone()),
            response_type: Set(client.response_type.as_str().to_string()),
            redirect_uri: Set(client.redirect_uri.clone()),
            scope: Set(join_set(&client.scope)),
            owner: Set(client.owner.clone()),
            secret_hash: Set(client.secret_hash.clone()),
            created_at: Set(client.created_at),
            ttl: Set(client.ttl),
            expires_at: Set(client.expires_at()),
        };
        clients::Entity::insert(row)
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(client.id)
    }

    async fn find_client(&self, id: &str) -> StoreResult<Option<ClientApplication>> {
        clients::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .map(client_from_row)
            .transpose()
    }

    async fn find_client_by_name(&self, name: &str) -> StoreResult<Option<ClientApplication>> {
        clients::Entity::find()
            .filter(clients::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await?
            .map(client_from_row)
            .transpose()
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        clients::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn list_clients(&self, offset: u64, limit: u64) -> StoreResult<Vec<ClientApplication>> {
        clients::Entity::find()
            .order_by_asc(clients::Column::CreatedAt)
            .order_by_asc(clients::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(client_from_row)
            .collect()
    }

    async fn count_clients(&self) -> StoreResult<u64> {
        Ok(clients::Entity::find().count(self.db.as_ref()).await?)
    }

    async fn create_token(&self, kind: TokenKind, token: Token) -> StoreResult<String> {
        let expires_at = token.expires_at();
        with_token_table!(kind, table => {
            let row = table::ActiveModel {
                id: Set(token.id.clone()),
                client_id: Set(token.client_id.clone()),
                user_id: Set(token.user_id.clone()),
                created_at: Set(token.created_at),
                ttl: Set(token.ttl),
                expires_at: Set(expires_at),
            };
            table::Entity::insert(row)
                .exec_without_returning(self.db.as_ref())
                .await?;
        });
        Ok(token.id)
    }

    async fn find_token(&self, kind: TokenKind, id: &str) -> StoreResult<Option<Token>> {
        with_token_table!(kind, table => {
            Ok(table::Entity::find_by_id(id)
                .one(self.db.as_ref())
                .await?
                .map(|row| Token {
                    id: row.id,
                    client_id: row.client_id,
                    user_id: row.user_id,
                    created_at: row.created_at,
                    ttl: row.ttl,
                }))
        })
    }

    async fn delete_token(&self, kind: TokenKind, id: &str) -> StoreResult<()> {
        with_token_table!(kind, table => {
            table::Entity::delete_by_id(id)
                .exec(self.db.as_ref())
                .await?;
        });
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let db = self.db.as_ref();
        let mut removed = pending_users::Entity::delete_many()
            .filter(pending_users::Column::ExpiresAt.lt(now))
            .exec(db)
            .await?
            .rows_affected;
        removed += clients::Entity::delete_many()
            .filter(clients::Column::ExpiresAt.lt(now))
            .exec(db)
            .await?
            .rows_affected;
        for kind in TokenKind::ALL {
            removed += with_token_table!(kind, table => {
                table::Entity::delete_many()
                    .filter(table::Column::ExpiresAt.lt(now))
                    .exec(db)
                    .await?
                    .rows_affected
            });
        }
        Ok(removed)
    }
}
