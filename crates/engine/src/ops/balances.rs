//! Balance maintenance.
//!
//! Every entry write goes through [`apply_entry_deltas`] inside the same
//! database transaction as the entry itself, applying the minimal balance
//! delta instead of recomputing from scratch. [`Engine::recompute_balances`]
//! is the full replay used to verify or repair the denormalized balances.

use std::collections::HashMap;

use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{
    Account, AccountKind, EngineError, Entry, EntryKind, ResultEngine, accounts,
    accounts::check_sign_invariant, entries,
};

use super::{Engine, with_tx};

/// The per-account balance deltas of one entry, as applied on insert.
///
/// Expense subtracts from its account, income adds, transfer and debt
/// operations move the amount from source to destination.
pub(super) fn entry_deltas(entry: &Entry) -> ResultEngine<Vec<(Uuid, i64)>> {
    let missing =
        |field: &str| EngineError::InvalidInput(format!("{} entry without {field}", entry.kind.as_str()));

    match entry.kind {
        EntryKind::Expense => {
            let account = entry.account_id.ok_or_else(|| missing("account"))?;
            Ok(vec![(account, -entry.amount_minor)])
        }
        EntryKind::Income => {
            let account = entry.account_id.ok_or_else(|| missing("account"))?;
            Ok(vec![(account, entry.amount_minor)])
        }
        EntryKind::Transfer | EntryKind::DebtOp => {
            let from = entry.from_account_id.ok_or_else(|| missing("source account"))?;
            let to = entry.to_account_id.ok_or_else(|| missing("destination account"))?;
            Ok(vec![(from, -entry.amount_minor), (to, entry.amount_minor)])
        }
    }
}

/// Apply an entry's balance deltas with the given sign.
///
/// `sign = 1` applies the entry (insert), `sign = -1` reverses it (delete).
pub(super) async fn apply_entry_deltas(
    db_tx: &DatabaseTransaction,
    entry: &Entry,
    sign: i64,
) -> ResultEngine<()> {
    let deltas: Vec<(Uuid, i64)> = entry_deltas(entry)?
        .into_iter()
        .map(|(account_id, delta)| (account_id, sign * delta))
        .collect();
    apply_deltas(db_tx, &entry.owner, &deltas).await
}

/// The net balance change of replacing `old` with `new`, per account.
///
/// Netting before applying means only the final balance is checked against
/// the sign invariant; the transient state between reversing the old amount
/// and applying the new one never has to be valid on its own.
pub(super) fn edit_deltas(old: &Entry, new: &Entry) -> ResultEngine<Vec<(Uuid, i64)>> {
    let mut net: HashMap<Uuid, i64> = HashMap::new();
    for (account_id, delta) in entry_deltas(old)? {
        *net.entry(account_id).or_default() -= delta;
    }
    for (account_id, delta) in entry_deltas(new)? {
        *net.entry(account_id).or_default() += delta;
    }
    Ok(net.into_iter().filter(|(_, delta)| *delta != 0).collect())
}

/// Apply raw per-account deltas, re-checking each touched account against
/// the sign invariant after the write.
pub(super) async fn apply_deltas(
    db_tx: &DatabaseTransaction,
    owner: &str,
    deltas: &[(Uuid, i64)],
) -> ResultEngine<()> {
    for (account_id, delta) in deltas {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .filter(accounts::Column::Owner.eq(owner.to_string()))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;

        let kind = AccountKind::try_from(model.kind.as_str())?;
        let new_balance = model.balance_minor + delta;
        check_sign_invariant(kind, new_balance, &model.name)?;

        let mut active: accounts::ActiveModel = model.into();
        active.balance_minor = ActiveValue::Set(new_balance);
        active.update(db_tx).await?;
    }
    Ok(())
}

impl Engine {
    /// Recompute every account balance of `owner` by replaying the ledger.
    ///
    /// The denormalized balances are normally maintained incrementally; this
    /// replays all entries from zero and overwrites whatever is stored,
    /// repairing any drift. Returns the accounts with their recomputed
    /// balances.
    pub async fn recompute_balances(&self, owner: &str) -> ResultEngine<Vec<Account>> {
        with_tx!(self, |db_tx| {
            let account_models = accounts::Entity::find()
                .filter(accounts::Column::Owner.eq(owner.to_string()))
                .all(&db_tx)
                .await?;

            let mut balances: HashMap<Uuid, i64> = HashMap::new();
            let mut rebuilt = Vec::with_capacity(account_models.len());
            for model in account_models {
                let mut account = Account::try_from(model)?;
                account.balance_minor = 0;
                balances.insert(account.id, 0);
                rebuilt.push(account);
            }

            let entry_models = entries::Entity::find()
                .filter(entries::Column::Owner.eq(owner.to_string()))
                .all(&db_tx)
                .await?;
            for model in entry_models {
                let entry = Entry::try_from(model)?;
                for (account_id, delta) in entry_deltas(&entry)? {
                    let balance = balances.get_mut(&account_id).ok_or_else(|| {
                        EngineError::NotFound("account".to_string())
                    })?;
                    *balance += delta;
                }
            }

            for account in &mut rebuilt {
                account.balance_minor = balances[&account.id];
                check_sign_invariant(account.kind, account.balance_minor, &account.name)?;

                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(account.id.to_string()),
                    balance_minor: ActiveValue::Set(account.balance_minor),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }

            info!(owner, accounts = rebuilt.len(), "balances recomputed");
            Ok(rebuilt)
        })
    }
}
