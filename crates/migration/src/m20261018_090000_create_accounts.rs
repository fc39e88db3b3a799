//! Creates the account tables: verified users and sign-ups awaiting
//! email verification.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::FirstName).string().not_null())
                    .col(ColumnDef::new(Users::LastName).string().not_null())
                    .col(ColumnDef::new(Users::Realms).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PendingUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PendingUsers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PendingUsers::Email)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PendingUsers::PasswordHash).string().not_null())
                    .col(ColumnDef::new(PendingUsers::FirstName).string().not_null())
                    .col(ColumnDef::new(PendingUsers::LastName).string().not_null())
                    .col(
                        ColumnDef::new(PendingUsers::Realms)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(PendingUsers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PendingUsers::Ttl).big_integer().not_null())
                    .col(
                        ColumnDef::new(PendingUsers::ExpiresAt)
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
                    .name("idx_pending_users_expires_at")
                    .table(PendingUsers::Table)
                    .col(PendingUsers::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_pending_users_expires_at").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PendingUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Realms,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PendingUsers {
    Table,
    Id,
    Email,
    PasswordHash,
    FirstName,
    LastName,
    Realms,
    CreatedAt,
    Ttl,
    ExpiresAt,
}
