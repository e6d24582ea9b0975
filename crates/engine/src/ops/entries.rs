use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    AccountKind, EngineError, Entry, EntryListFilter, ResultEngine, SimpleEntryCmd, TransferCmd,
    UpdateEntryCmd, accounts, entries, util::normalize_optional_text,
};

use super::{
    Engine,
    accounts::require_account,
    balances::{apply_deltas, apply_entry_deltas, edit_deltas},
    with_tx,
};

impl Engine {
    /// Record an expense against an asset/savings account.
    pub async fn expense(&self, cmd: SimpleEntryCmd) -> ResultEngine<Entry> {
        let entry = Entry::expense(
            cmd.owner,
            cmd.date,
            cmd.amount_minor,
            cmd.account_id,
            normalize_optional_text(cmd.category.as_deref()),
            normalize_optional_text(cmd.note.as_deref()),
        )?;
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &entry.owner, cmd.account_id).await?;
            self.insert_entry(&db_tx, &entry).await?;
            Ok(entry)
        })
    }

    /// Record an income against an asset/savings account.
    pub async fn income(&self, cmd: SimpleEntryCmd) -> ResultEngine<Entry> {
        let entry = Entry::income(
            cmd.owner,
            cmd.date,
            cmd.amount_minor,
            cmd.account_id,
            normalize_optional_text(cmd.category.as_deref()),
            normalize_optional_text(cmd.note.as_deref()),
        )?;
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &entry.owner, cmd.account_id).await?;
            self.insert_entry(&db_tx, &entry).await?;
            Ok(entry)
        })
    }

    /// Move money between two asset/savings accounts.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<Entry> {
        let entry = Entry::transfer(
            cmd.owner,
            cmd.date,
            cmd.amount_minor,
            cmd.from_account_id,
            cmd.to_account_id,
            normalize_optional_text(cmd.note.as_deref()),
        )?;
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &entry.owner, cmd.from_account_id).await?;
            require_money_account(&db_tx, &entry.owner, cmd.to_account_id).await?;
            self.insert_entry(&db_tx, &entry).await?;
            Ok(entry)
        })
    }

    /// Return an entry snapshot from DB.
    pub async fn entry(&self, owner: &str, entry_id: Uuid) -> ResultEngine<Entry> {
        let model = entries::Entity::find_by_id(entry_id.to_string())
            .filter(entries::Column::Owner.eq(owner.to_string()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("entry".to_string()))?;
        Entry::try_from(model)
    }

    /// List entries, newest first.
    pub async fn entries(
        &self,
        owner: &str,
        filter: EntryListFilter,
    ) -> ResultEngine<Vec<Entry>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from >= to
        {
            return Err(EngineError::InvalidInput(
                "invalid range: from must be < to".to_string(),
            ));
        }

        let mut query = entries::Entity::find()
            .filter(entries::Column::Owner.eq(owner.to_string()))
            .order_by_desc(entries::Column::Date)
            .order_by_desc(entries::Column::CreatedAt);

        if let Some(account_id) = filter.account_id {
            query = query.filter(super::accounts::entries_referencing(account_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(entries::Column::Kind.eq(kind.as_str()));
        }
        if filter.debt_only {
            query = query.filter(entries::Column::IsDebt.eq(true));
        }
        if let Some(from) = filter.from {
            query = query.filter(entries::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(entries::Column::Date.lt(to));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Entry::try_from)
            .collect()
    }

    /// Edit an entry's mutable fields (amount, date, category, note, due
    /// date). Kind and account references are immutable.
    ///
    /// The edit is guarded by an optimistic lock: `expected_created_at` must
    /// match the stored version token or the write fails with
    /// [`EngineError::ConcurrentModification`]. On success the token is
    /// refreshed, so a second editor holding the old token loses. Balance
    /// effects of an amount change are reversed/reapplied atomically with
    /// the entry row.
    pub async fn update_entry(&self, cmd: UpdateEntryCmd) -> ResultEngine<Entry> {
        if let Some(amount_minor) = cmd.amount_minor
            && amount_minor <= 0
        {
            return Err(EngineError::InvalidInput(
                "amount_minor must be > 0".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let model = entries::Entity::find_by_id(cmd.entry_id.to_string())
                .filter(entries::Column::Owner.eq(cmd.owner.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("entry".to_string()))?;
            let old = Entry::try_from(model)?;

            if old.created_at != cmd.expected_created_at {
                return Err(EngineError::ConcurrentModification(format!(
                    "entry {} was modified by another writer",
                    cmd.entry_id
                )));
            }

            let mut new = old.clone();
            if let Some(amount_minor) = cmd.amount_minor {
                new.amount_minor = amount_minor;
            }
            if let Some(date) = cmd.date {
                new.date = date;
            }
            if let Some(category) = cmd.category.as_deref() {
                new.category = normalize_optional_text(Some(category));
            }
            if let Some(note) = cmd.note.as_deref() {
                new.note = normalize_optional_text(Some(note));
            }
            if let Some(due_date) = cmd.due_date {
                new.due_date = Some(due_date);
            }
            new.created_at = Utc::now();

            if new.amount_minor != old.amount_minor {
                let deltas = edit_deltas(&old, &new)?;
                apply_deltas(&db_tx, &new.owner, &deltas).await?;
            }

            // The token re-check at the SQL level closes the race with a
            // writer that committed between our read and this update.
            let active: entries::ActiveModel = (&new).into();
            let result = entries::Entity::update_many()
                .set(active)
                .filter(entries::Column::Id.eq(cmd.entry_id.to_string()))
                .filter(entries::Column::CreatedAt.eq(cmd.expected_created_at))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::ConcurrentModification(format!(
                    "entry {} was modified by another writer",
                    cmd.entry_id
                )));
            }

            if new.is_debt
                && let Some(related) = new.related_account_id
            {
                self.sync_obligation_status(&db_tx, &new.owner, related)
                    .await?;
            }

            info!(owner = %new.owner, entry = %new.id, "entry updated");
            Ok(new)
        })
    }

    /// Delete a simple entry, reversing its balance effect.
    ///
    /// Entries that are part of a debt relationship cannot be deleted one at
    /// a time; removing the relationship is an explicit cascade via
    /// [`Engine::delete_account_with_entries`].
    pub async fn delete_entry(&self, owner: &str, entry_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = entries::Entity::find_by_id(entry_id.to_string())
                .filter(entries::Column::Owner.eq(owner.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("entry".to_string()))?;
            let entry = Entry::try_from(model)?;

            if entry.is_debt {
                return Err(EngineError::DependentDataPresent(
                    "debt entries cannot be deleted individually; delete the whole relationship"
                        .to_string(),
                ));
            }

            apply_entry_deltas(&db_tx, &entry, -1).await?;
            entries::Entity::delete_by_id(entry_id.to_string())
                .exec(&db_tx)
                .await?;

            info!(owner, entry = %entry_id, "entry deleted");
            Ok(())
        })
    }

    /// Insert an entry and apply its balance deltas. Runs inside the
    /// caller's transaction so the entry and its balance effect commit
    /// together.
    pub(super) async fn insert_entry(
        &self,
        db_tx: &DatabaseTransaction,
        entry: &Entry,
    ) -> ResultEngine<()> {
        apply_entry_deltas(db_tx, entry, 1).await?;
        let active: entries::ActiveModel = entry.into();
        active.insert(db_tx).await?;
        info!(owner = %entry.owner, entry = %entry.id, kind = entry.kind.as_str(), "entry recorded");
        Ok(())
    }
}

/// Require an active asset/savings account. Obligation accounts only take
/// entries through the debt operations.
pub(super) async fn require_money_account(
    db_tx: &DatabaseTransaction,
    owner: &str,
    account_id: Uuid,
) -> ResultEngine<accounts::Model> {
    let model = require_account(db_tx, owner, account_id).await?;
    let kind = AccountKind::try_from(model.kind.as_str())?;
    if kind.is_obligation() {
        return Err(EngineError::InvalidInput(format!(
            "account '{}' tracks a debt; use the debt operations",
            model.name
        )));
    }
    Ok(model)
}
