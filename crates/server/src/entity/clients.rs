//! Registered client applications.

use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// `code` or `token`
    pub response_type: String,
    #[sea_orm(column_type = "Text")]
    pub redirect_uri: String,
    /// Space-separated granted scopes
    #[sea_orm(column_type = "Text")]
    pub scope: String,
    pub owner: String,
    pub secret_hash: String,
    pub created_at: OffsetDateTime,
    pub ttl: i64,
    pub expires_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
