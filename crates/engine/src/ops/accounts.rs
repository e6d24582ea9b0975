use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    Account, AccountKind, AccountListFilter, AccountPatch, CreateAccountCmd, EngineError, Entry,
    ResultEngine, accounts, entries,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create an account.
    ///
    /// Obligation accounts (receivable/liability) must carry a counterparty,
    /// cannot have a credit limit, and start settled; their balance only
    /// moves through debt operations. A nonzero opening balance on an
    /// asset/savings account is recorded as an opening entry so that the
    /// balance stays equal to the sum of its entries.
    pub async fn create_account(&self, cmd: CreateAccountCmd) -> ResultEngine<Account> {
        let name = normalize_required_name(&cmd.name, "account")?;
        let counterparty = normalize_optional_text(cmd.counterparty.as_deref());

        if cmd.kind.is_obligation() && counterparty.is_none() {
            return Err(EngineError::InvalidInput(format!(
                "{} accounts require a counterparty",
                cmd.kind.as_str()
            )));
        }
        if !cmd.kind.is_obligation() && counterparty.is_some() {
            return Err(EngineError::InvalidInput(format!(
                "{} accounts cannot have a counterparty",
                cmd.kind.as_str()
            )));
        }
        if cmd.kind.is_obligation() && cmd.balance_minor != 0 {
            return Err(EngineError::InvalidInput(
                "debt accounts start settled; use lend/borrow to open a debt".to_string(),
            ));
        }
        if cmd.credit_limit_minor.is_some() && cmd.kind != AccountKind::Asset {
            return Err(EngineError::InvalidInput(
                "credit limit is only valid on asset accounts".to_string(),
            ));
        }
        if let Some(limit) = cmd.credit_limit_minor
            && limit < 0
        {
            return Err(EngineError::InvalidInput(
                "credit limit must be >= 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let exists = accounts::Entity::find()
                .filter(accounts::Column::Owner.eq(cmd.owner.clone()))
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::InvalidInput(format!(
                    "account '{name}' already exists"
                )));
            }

            let mut account = Account::new(cmd.owner.clone(), name.clone(), cmd.kind);
            account.credit_limit_minor = cmd.credit_limit_minor;
            account.counterparty = counterparty;
            account.due_date = cmd.due_date;

            let model: accounts::ActiveModel = (&account).into();
            model.insert(&db_tx).await?;

            if cmd.balance_minor != 0 {
                let date = chrono::Utc::now().date_naive();
                let note = Some(format!("opening balance for account '{name}'"));
                let opening = if cmd.balance_minor > 0 {
                    Entry::income(
                        cmd.owner.clone(),
                        date,
                        cmd.balance_minor,
                        account.id,
                        Some("opening".to_string()),
                        note,
                    )?
                } else {
                    Entry::expense(
                        cmd.owner.clone(),
                        date,
                        -cmd.balance_minor,
                        account.id,
                        Some("opening".to_string()),
                        note,
                    )?
                };
                self.insert_entry(&db_tx, &opening).await?;
                account.balance_minor = cmd.balance_minor;
            }

            info!(owner = %account.owner, account = %account.id, kind = cmd.kind.as_str(), "account created");
            Ok(account)
        })
    }

    /// Return an account snapshot from DB.
    pub async fn account(&self, owner: &str, account_id: Uuid) -> ResultEngine<Account> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .filter(accounts::Column::Owner.eq(owner.to_string()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
        Account::try_from(model)
    }

    /// List accounts, optionally filtered by kind and status. Archived
    /// accounts are skipped unless `include_hidden` is set.
    pub async fn accounts(
        &self,
        owner: &str,
        filter: AccountListFilter,
    ) -> ResultEngine<Vec<Account>> {
        let mut query = accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(owner.to_string()))
            .order_by_asc(accounts::Column::Name);

        if let Some(kind) = filter.kind {
            query = query.filter(accounts::Column::Kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(accounts::Column::Status.eq(status.as_str()));
        }
        if !filter.include_hidden {
            query = query.filter(accounts::Column::Hidden.eq(false));
        }

        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Apply a field patch to an account.
    ///
    /// A `balance_minor` patch is a manual correction: the difference to the
    /// stored balance is recorded as an adjustment entry, keeping the
    /// balance equal to the sum of its entries. Debt account balances only
    /// move through debt operations.
    pub async fn update_account(
        &self,
        owner: &str,
        account_id: Uuid,
        patch: AccountPatch,
    ) -> ResultEngine<Account> {
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_required_name(n, "account"))
            .transpose()?;
        let counterparty = normalize_optional_text(patch.counterparty.as_deref());

        with_tx!(self, |db_tx| {
            let model = require_account(&db_tx, owner, account_id).await?;
            let kind = AccountKind::try_from(model.kind.as_str())?;

            if counterparty.is_some() && !kind.is_obligation() {
                return Err(EngineError::InvalidInput(format!(
                    "{} accounts cannot have a counterparty",
                    kind.as_str()
                )));
            }
            if patch.balance_minor.is_some() && kind.is_obligation() {
                return Err(EngineError::InvalidInput(
                    "debt balances only move through debt operations".to_string(),
                ));
            }

            let account_name = model.name.clone();
            let stored_balance = model.balance_minor;

            let has_field_changes =
                name.is_some() || patch.due_date.is_some() || counterparty.is_some();
            if has_field_changes {
                let mut active = accounts::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    ..Default::default()
                };
                if let Some(name) = name {
                    active.name = ActiveValue::Set(name);
                }
                if let Some(due_date) = patch.due_date {
                    active.due_date = ActiveValue::Set(Some(due_date));
                }
                if let Some(counterparty) = counterparty {
                    active.counterparty = ActiveValue::Set(Some(counterparty));
                }
                active.update(&db_tx).await?;
            }

            if let Some(target) = patch.balance_minor {
                let diff = target - stored_balance;
                if diff != 0 {
                    let date = chrono::Utc::now().date_naive();
                    let note = Some(format!("balance correction for account '{account_name}'"));
                    let adjustment = if diff > 0 {
                        Entry::income(
                            owner.to_string(),
                            date,
                            diff,
                            account_id,
                            Some("adjustment".to_string()),
                            note,
                        )?
                    } else {
                        Entry::expense(
                            owner.to_string(),
                            date,
                            -diff,
                            account_id,
                            Some("adjustment".to_string()),
                            note,
                        )?
                    };
                    self.insert_entry(&db_tx, &adjustment).await?;
                }
            }

            let updated = require_account(&db_tx, owner, account_id).await?;
            Account::try_from(updated)
        })
    }

    /// Archives/unarchives an existing account. Archived accounts keep their
    /// history and stay visible to balance recomputation.
    pub async fn set_account_archived(
        &self,
        owner: &str,
        account_id: Uuid,
        archived: bool,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_account(&db_tx, owner, account_id).await?;

            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                hidden: ActiveValue::Set(archived),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Delete an account that has no ledger history.
    ///
    /// Refused with [`EngineError::DependentDataPresent`] while any entry
    /// still references the account; use
    /// [`Engine::delete_account_with_entries`] to remove the history too.
    pub async fn delete_account(&self, owner: &str, account_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = require_account(&db_tx, owner, account_id).await?;

            let referenced = entries::Entity::find()
                .filter(entries_referencing(account_id))
                .one(&db_tx)
                .await?
                .is_some();
            if referenced {
                return Err(EngineError::DependentDataPresent(format!(
                    "account '{}' still has entries",
                    model.name
                )));
            }

            accounts::Entity::delete_by_id(account_id.to_string())
                .exec(&db_tx)
                .await?;
            info!(owner, account = %account_id, "account deleted");
            Ok(())
        })
    }

    /// Return the obligation account for `counterparty`, creating it if it
    /// does not exist yet. Idempotent: repeated calls with the same
    /// owner/kind/counterparty return the same account.
    pub async fn find_or_create_counterparty(
        &self,
        owner: &str,
        kind: AccountKind,
        counterparty: &str,
    ) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            self.find_or_create_counterparty_tx(&db_tx, owner, kind, counterparty)
                .await
        })
    }

    pub(super) async fn find_or_create_counterparty_tx(
        &self,
        db_tx: &DatabaseTransaction,
        owner: &str,
        kind: AccountKind,
        counterparty: &str,
    ) -> ResultEngine<Account> {
        if !kind.is_obligation() {
            return Err(EngineError::InvalidInput(format!(
                "{} accounts are not counterparty accounts",
                kind.as_str()
            )));
        }
        let counterparty = normalize_required_name(counterparty, "counterparty")?;

        let existing = accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(owner.to_string()))
            .filter(accounts::Column::Kind.eq(kind.as_str()))
            .filter(accounts::Column::Counterparty.eq(counterparty.clone()))
            .one(db_tx)
            .await?;
        if let Some(model) = existing {
            return Account::try_from(model);
        }

        let mut account = Account::new(owner, counterparty.clone(), kind);
        account.counterparty = Some(counterparty);

        let model: accounts::ActiveModel = (&account).into();
        model.insert(db_tx).await?;

        info!(owner, account = %account.id, kind = kind.as_str(), "counterparty account created");
        Ok(account)
    }
}

/// Condition matching every entry that references `account_id` in any role.
pub(super) fn entries_referencing(account_id: Uuid) -> sea_orm::Condition {
    let id = account_id.to_string();
    sea_orm::Condition::any()
        .add(entries::Column::AccountId.eq(id.clone()))
        .add(entries::Column::FromAccountId.eq(id.clone()))
        .add(entries::Column::ToAccountId.eq(id.clone()))
        .add(entries::Column::RelatedAccountId.eq(id))
}

pub(super) async fn require_account(
    db_tx: &DatabaseTransaction,
    owner: &str,
    account_id: Uuid,
) -> ResultEngine<accounts::Model> {
    accounts::Entity::find_by_id(account_id.to_string())
        .filter(accounts::Column::Owner.eq(owner.to_string()))
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("account".to_string()))
}
