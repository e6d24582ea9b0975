use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tracing::info;
use uuid::Uuid;

use crate::{Entry, ResultEngine, accounts, entries};

use super::{
    Engine,
    accounts::{entries_referencing, require_account},
    balances::{apply_deltas, entry_deltas},
    with_tx,
};

impl Engine {
    /// Delete an account together with every entry that references it.
    ///
    /// This is the explicit cascade path used to destroy a whole debt
    /// relationship (and its history) at once; it is intentionally separate
    /// from [`Engine::delete_account`], which refuses when entries exist.
    /// Entries are removed newest first, each reversing its balance effect
    /// on every other account it touches, so the surviving accounts end up
    /// as if the relationship never happened. The whole cascade runs in one
    /// database transaction; an interruption leaves nothing half-deleted.
    ///
    /// Returns the number of entries removed.
    pub async fn delete_account_with_entries(
        &self,
        owner: &str,
        account_id: Uuid,
    ) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let account = require_account(&db_tx, owner, account_id).await?;

            let models = entries::Entity::find()
                .filter(entries::Column::Owner.eq(owner.to_string()))
                .filter(entries_referencing(account_id))
                .order_by_desc(entries::Column::Date)
                .order_by_desc(entries::Column::CreatedAt)
                .all(&db_tx)
                .await?;

            let mut removed = 0u64;
            for model in models {
                let entry = Entry::try_from(model)?;
                // Only the surviving accounts get their balances reversed;
                // the account being deleted goes away with its whole
                // history, and entry dates are editable, so its own
                // intermediate balances need not replay validly.
                let deltas: Vec<(Uuid, i64)> = entry_deltas(&entry)?
                    .into_iter()
                    .filter(|(id, _)| *id != account_id)
                    .map(|(id, delta)| (id, -delta))
                    .collect();
                apply_deltas(&db_tx, &entry.owner, &deltas).await?;
                entries::Entity::delete_by_id(entry.id.to_string())
                    .exec(&db_tx)
                    .await?;
                removed += 1;
            }

            accounts::Entity::delete_by_id(account_id.to_string())
                .exec(&db_tx)
                .await?;

            info!(owner, account = %account_id, entries = removed, name = %account.name, "account cascade-deleted");
            Ok(removed)
        })
    }
}
