//! Initial schema migration - creates all tables from scratch.
//!
//! The complete schema for the ledger engine:
//!
//! - `users`: account and entry owners
//! - `accounts`: money locations (asset, savings) and obligation
//!   relationships (receivable, liability) with denormalized balances
//! - `entries`: the ledger itself, one row per recorded event

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
}

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Owner,
    Name,
    Kind,
    BalanceMinor,
    CreditLimitMinor,
    Counterparty,
    DueDate,
    Hidden,
    Status,
}

#[derive(Iden)]
enum Entries {
    Table,
    Id,
    Owner,
    Date,
    Kind,
    AmountMinor,
    AccountId,
    FromAccountId,
    ToAccountId,
    Category,
    IsDebt,
    Direction,
    Counterparty,
    RelatedAccountId,
    DueDate,
    Note,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::Owner).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::BalanceMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::CreditLimitMinor).big_integer())
                    .col(ColumnDef::new(Accounts::Counterparty).string())
                    .col(ColumnDef::new(Accounts::DueDate).date())
                    .col(ColumnDef::new(Accounts::Hidden).boolean().not_null())
                    .col(
                        ColumnDef::new(Accounts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-owner")
                            .from(Accounts::Table, Accounts::Owner)
                            .to(Users::Table, Users::Username),
                    )
                    .to_owned(),
            )
            .await?;

        // One relationship per person per direction: `(owner, kind,
        // counterparty)` is unique when counterparty is set. SQLite treats
        // NULLs as distinct, so asset/savings rows stay unconstrained.
        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-owner-kind-counterparty-unique")
                    .table(Accounts::Table)
                    .col(Accounts::Owner)
                    .col(Accounts::Kind)
                    .col(Accounts::Counterparty)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entries::Owner).string().not_null())
                    .col(ColumnDef::new(Entries::Date).date().not_null())
                    .col(ColumnDef::new(Entries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Entries::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Entries::AccountId).string())
                    .col(ColumnDef::new(Entries::FromAccountId).string())
                    .col(ColumnDef::new(Entries::ToAccountId).string())
                    .col(ColumnDef::new(Entries::Category).string())
                    .col(ColumnDef::new(Entries::IsDebt).boolean().not_null())
                    .col(ColumnDef::new(Entries::Direction).string())
                    .col(ColumnDef::new(Entries::Counterparty).string())
                    .col(ColumnDef::new(Entries::RelatedAccountId).string())
                    .col(ColumnDef::new(Entries::DueDate).date())
                    .col(ColumnDef::new(Entries::Note).string())
                    .col(ColumnDef::new(Entries::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-owner")
                            .from(Entries::Table, Entries::Owner)
                            .to(Users::Table, Users::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-account_id")
                            .from(Entries::Table, Entries::AccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-from_account_id")
                            .from(Entries::Table, Entries::FromAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-entries-to_account_id")
                            .from(Entries::Table, Entries::ToAccountId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-owner-date")
                    .table(Entries::Table)
                    .col(Entries::Owner)
                    .col(Entries::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-entries-related_account_id")
                    .table(Entries::Table)
                    .col(Entries::RelatedAccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Entries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
