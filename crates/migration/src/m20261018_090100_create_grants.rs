//! Creates registered clients and the three grant tables (authorization
//! codes, access tokens, refresh tokens). Grants share one column layout.

use sea_orm_migration::prelude::*;

const GRANT_TABLES: [&str; 3] = ["authorization_codes", "access_tokens", "refresh_tokens"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Clients::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Clients::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Clients::Description).text().not_null())
                    .col(ColumnDef::new(Clients::ResponseType).string().not_null())
                    .col(ColumnDef::new(Clients::RedirectUri).text().not_null())
                    .col(ColumnDef::new(Clients::Scope).text().not_null())
                    .col(ColumnDef::new(Clients::Owner).string().not_null())
                    .col(ColumnDef::new(Clients::SecretHash).string().not_null())
                    .col(
                        ColumnDef::new(Clients::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Clients::Ttl).big_integer().not_null())
                    .col(
                        ColumnDef::new(Clients::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clients_owner")
                    .table(Clients::Table)
                    .col(Clients::Owner)
                    .to_owned(),
            )
            .await?;

        for table in GRANT_TABLES {
            manager
                .create_table(
                    Table::create()
                        .table(Alias::new(table))
                        .if_not_exists()
                        .col(ColumnDef::new(Grant::Id).string().not_null().primary_key())
                        .col(ColumnDef::new(Grant::ClientId).string().not_null())
                        .col(ColumnDef::new(Grant::UserId).string().not_null())
                        .col(
                            ColumnDef::new(Grant::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Grant::Ttl).big_integer().not_null())
                        .col(
                            ColumnDef::new(Grant::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(format!("idx_{table}_expires_at"))
                        .table(Alias::new(table))
                        .col(Grant::ExpiresAt)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in GRANT_TABLES {
            manager
                .drop_index(Index::drop().name(format!("idx_{table}_expires_at")).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }
        manager
            .drop_index(Index::drop().name("idx_clients_owner").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    Name,
    Description,
    ResponseType,
    RedirectUri,
    Scope,
    Owner,
    SecretHash,
    CreatedAt,
    Ttl,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum Grant {
    Id,
    ClientId,
    UserId,
    CreatedAt,
    Ttl,
    ExpiresAt,
}
