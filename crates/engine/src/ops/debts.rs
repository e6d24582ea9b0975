//! Debt lifecycle operations.
//!
//! A debt relationship is an obligation account (receivable or liability)
//! plus every entry that references it. Lending/borrowing opens or grows the
//! obligation; collecting/repaying shrinks it; the smart variants resolve
//! over- and underpayments into extra entries; forgiveness writes the
//! remainder off. Whenever the obligation balance reaches zero the account is
//! closed, and any entry that makes it nonzero again reopens it.

use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    Account, AccountKind, AccountStatus, BorrowCmd, CollectCmd, DebtDirection, EngineError, Entry,
    ExpenseWithDebtCmd, LendCmd, MoneyCents, ResultEngine, SmartCollectCmd, accounts,
    util::normalize_optional_text,
};

use super::{
    Engine,
    accounts::require_account,
    entries::require_money_account,
    with_tx,
};

/// Payments within this distance of the outstanding amount settle the debt
/// exactly, absorbing rounding differences of one minor unit.
pub const SETTLE_TOLERANCE_MINOR: i64 = 1;

/// How a payment against an outstanding obligation is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Settlement {
    /// Within tolerance of the outstanding amount: settle for exactly the
    /// outstanding amount.
    Exact,
    /// More than outstanding: settle in full, record the excess separately.
    Overpaid { extra_minor: i64 },
    /// Less than outstanding with `close_debt`: settle what was paid, forgive
    /// the remainder.
    UnderpaidClosed { forgiven_minor: i64 },
    /// Less than outstanding: ordinary partial payment, debt stays open.
    Partial,
}

fn resolve_settlement(outstanding_minor: i64, amount_minor: i64, close_debt: bool) -> ResultEngine<Settlement> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidInput(
            "amount_minor must be > 0".to_string(),
        ));
    }
    if outstanding_minor <= 0 {
        return Err(EngineError::InvalidInput(
            "nothing outstanding on this debt".to_string(),
        ));
    }

    let diff = amount_minor - outstanding_minor;
    if diff.abs() <= SETTLE_TOLERANCE_MINOR {
        Ok(Settlement::Exact)
    } else if diff > 0 {
        Ok(Settlement::Overpaid { extra_minor: diff })
    } else if close_debt {
        Ok(Settlement::UnderpaidClosed {
            forgiven_minor: -diff,
        })
    } else {
        Ok(Settlement::Partial)
    }
}

impl Engine {
    /// Lend money to a counterparty: moves the amount from an asset account
    /// into the counterparty's receivable account, creating the receivable on
    /// first use. Lending to a settled counterparty reopens the relationship.
    pub async fn lend(&self, cmd: LendCmd) -> ResultEngine<Entry> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.source_account_id).await?;
            let receivable = self
                .find_or_create_counterparty_tx(
                    &db_tx,
                    &cmd.owner,
                    AccountKind::Receivable,
                    &cmd.counterparty,
                )
                .await?;

            let entry = Entry::debt_op(
                cmd.owner.clone(),
                cmd.date,
                cmd.amount_minor,
                cmd.source_account_id,
                receivable.id,
                DebtDirection::Lent,
                receivable.counterparty.clone().unwrap_or(cmd.counterparty),
                receivable.id,
                normalize_optional_text(cmd.note.as_deref()),
            )?;
            self.insert_entry(&db_tx, &entry).await?;

            if cmd.due_date.is_some() {
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(receivable.id.to_string()),
                    due_date: ActiveValue::Set(cmd.due_date),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            self.sync_obligation_status(&db_tx, &cmd.owner, receivable.id)
                .await?;

            info!(owner = %cmd.owner, account = %receivable.id, amount = %MoneyCents::new(cmd.amount_minor), "lent");
            Ok(entry)
        })
    }

    /// Borrow money from a counterparty: moves the amount out of the
    /// counterparty's liability account (pushing it negative) into an asset
    /// account.
    pub async fn borrow(&self, cmd: BorrowCmd) -> ResultEngine<Entry> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.destination_account_id).await?;
            let liability = self
                .find_or_create_counterparty_tx(
                    &db_tx,
                    &cmd.owner,
                    AccountKind::Liability,
                    &cmd.counterparty,
                )
                .await?;

            let mut entry = Entry::debt_op(
                cmd.owner.clone(),
                cmd.date,
                cmd.amount_minor,
                liability.id,
                cmd.destination_account_id,
                DebtDirection::Borrowed,
                liability.counterparty.clone().unwrap_or(cmd.counterparty),
                liability.id,
                normalize_optional_text(cmd.note.as_deref()),
            )?;
            entry.category = normalize_optional_text(cmd.category.as_deref());
            self.insert_entry(&db_tx, &entry).await?;

            if cmd.due_date.is_some() {
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(liability.id.to_string()),
                    due_date: ActiveValue::Set(cmd.due_date),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            self.sync_obligation_status(&db_tx, &cmd.owner, liability.id)
                .await?;

            info!(owner = %cmd.owner, account = %liability.id, amount = %MoneyCents::new(cmd.amount_minor), "borrowed");
            Ok(entry)
        })
    }

    /// Collect an exact amount from a receivable into an asset account.
    ///
    /// Collecting more than the outstanding amount is an invariant violation
    /// (the receivable would go negative); use
    /// [`Engine::collect_debt_smart`] to resolve overpayments instead.
    pub async fn collect_debt(&self, cmd: CollectCmd) -> ResultEngine<Entry> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.asset_account_id).await?;
            let receivable = require_obligation(
                &db_tx,
                &cmd.owner,
                cmd.counterparty_account_id,
                AccountKind::Receivable,
            )
            .await?;

            let entry = self
                .settle_entry(&db_tx, &cmd, &receivable, cmd.amount_minor)
                .await?;
            self.sync_obligation_status(&db_tx, &cmd.owner, receivable.id)
                .await?;
            Ok(entry)
        })
    }

    /// Repay an exact amount of a liability from an asset account.
    pub async fn repay_debt(&self, cmd: CollectCmd) -> ResultEngine<Entry> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.asset_account_id).await?;
            let liability = require_obligation(
                &db_tx,
                &cmd.owner,
                cmd.counterparty_account_id,
                AccountKind::Liability,
            )
            .await?;

            let entry = self
                .settle_entry(&db_tx, &cmd, &liability, cmd.amount_minor)
                .await?;
            self.sync_obligation_status(&db_tx, &cmd.owner, liability.id)
                .await?;
            Ok(entry)
        })
    }

    /// Collect from a receivable with smart over/underpayment resolution.
    ///
    /// Within one minor unit of the outstanding amount the debt is settled
    /// exactly. An overpayment settles the debt and records the excess as an
    /// ordinary income on the asset account. An underpayment with
    /// `close_debt` settles what was paid and forgives the remainder; without
    /// it the payment is an ordinary partial collection. Returns every entry
    /// written, settlement first.
    pub async fn collect_debt_smart(&self, cmd: SmartCollectCmd) -> ResultEngine<Vec<Entry>> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.asset_account_id).await?;
            let receivable = require_obligation(
                &db_tx,
                &cmd.owner,
                cmd.counterparty_account_id,
                AccountKind::Receivable,
            )
            .await?;
            let outstanding = receivable.outstanding_minor();
            let plan = resolve_settlement(outstanding, cmd.amount_minor, cmd.close_debt)?;

            let exact = CollectCmd {
                owner: cmd.owner.clone(),
                counterparty_account_id: cmd.counterparty_account_id,
                asset_account_id: cmd.asset_account_id,
                amount_minor: cmd.amount_minor,
                date: cmd.date,
                note: cmd.note.clone(),
            };
            let mut written = Vec::new();

            match plan {
                Settlement::Exact => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &receivable, outstanding)
                            .await?,
                    );
                }
                Settlement::Overpaid { extra_minor } => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &receivable, outstanding)
                            .await?,
                    );
                    let extra = Entry::income(
                        cmd.owner.clone(),
                        cmd.date,
                        extra_minor,
                        cmd.asset_account_id,
                        Some("debt overpayment".to_string()),
                        normalize_optional_text(cmd.note.as_deref()),
                    )?;
                    self.insert_entry(&db_tx, &extra).await?;
                    written.push(extra);
                }
                Settlement::UnderpaidClosed { forgiven_minor } => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &receivable, cmd.amount_minor)
                            .await?,
                    );
                    written.push(
                        self.forgive_entry(&db_tx, &receivable, forgiven_minor, cmd.date, None)
                            .await?,
                    );
                }
                Settlement::Partial => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &receivable, cmd.amount_minor)
                            .await?,
                    );
                }
            }

            self.sync_obligation_status(&db_tx, &cmd.owner, receivable.id)
                .await?;
            Ok(written)
        })
    }

    /// Repay a liability with smart over/underpayment resolution. Mirror of
    /// [`Engine::collect_debt_smart`]; an overpayment records the excess as
    /// an ordinary expense on the asset account.
    pub async fn repay_debt_smart(&self, cmd: SmartCollectCmd) -> ResultEngine<Vec<Entry>> {
        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.asset_account_id).await?;
            let liability = require_obligation(
                &db_tx,
                &cmd.owner,
                cmd.counterparty_account_id,
                AccountKind::Liability,
            )
            .await?;
            let outstanding = liability.outstanding_minor();
            let plan = resolve_settlement(outstanding, cmd.amount_minor, cmd.close_debt)?;

            let exact = CollectCmd {
                owner: cmd.owner.clone(),
                counterparty_account_id: cmd.counterparty_account_id,
                asset_account_id: cmd.asset_account_id,
                amount_minor: cmd.amount_minor,
                date: cmd.date,
                note: cmd.note.clone(),
            };
            let mut written = Vec::new();

            match plan {
                Settlement::Exact => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &liability, outstanding)
                            .await?,
                    );
                }
                Settlement::Overpaid { extra_minor } => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &liability, outstanding)
                            .await?,
                    );
                    let extra = Entry::expense(
                        cmd.owner.clone(),
                        cmd.date,
                        extra_minor,
                        cmd.asset_account_id,
                        Some("debt overpayment".to_string()),
                        normalize_optional_text(cmd.note.as_deref()),
                    )?;
                    self.insert_entry(&db_tx, &extra).await?;
                    written.push(extra);
                }
                Settlement::UnderpaidClosed { forgiven_minor } => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &liability, cmd.amount_minor)
                            .await?,
                    );
                    written.push(
                        self.forgive_entry(&db_tx, &liability, forgiven_minor, cmd.date, None)
                            .await?,
                    );
                }
                Settlement::Partial => {
                    written.push(
                        self.settle_entry(&db_tx, &exact, &liability, cmd.amount_minor)
                            .await?,
                    );
                }
            }

            self.sync_obligation_status(&db_tx, &cmd.owner, liability.id)
                .await?;
            Ok(written)
        })
    }

    /// Write off whatever remains of an obligation and close it.
    ///
    /// Returns the forgiveness entry, or `None` when nothing was outstanding
    /// and the account was merely closed. The write-off and the status
    /// change commit in one transaction, so a concurrent collection either
    /// lands before the forgiveness or fails against the closed debt.
    pub async fn forgive_debt(
        &self,
        owner: &str,
        counterparty_account_id: Uuid,
        date: NaiveDate,
        note: Option<&str>,
    ) -> ResultEngine<Option<Entry>> {
        with_tx!(self, |db_tx| {
            let model = require_account(&db_tx, owner, counterparty_account_id).await?;
            let account = Account::try_from(model)?;
            if !account.kind.is_obligation() {
                return Err(EngineError::InvalidInput(format!(
                    "account '{}' is not a debt account",
                    account.name
                )));
            }

            let outstanding = account.outstanding_minor();
            let entry = if outstanding > 0 {
                Some(
                    self.forgive_entry(
                        &db_tx,
                        &account,
                        outstanding,
                        date,
                        normalize_optional_text(note),
                    )
                    .await?,
                )
            } else {
                None
            };

            self.sync_obligation_status(&db_tx, owner, account.id)
                .await?;
            info!(owner, account = %account.id, amount = %MoneyCents::new(outstanding), "debt forgiven");
            Ok(entry)
        })
    }

    /// Record a shared expense: the payer's own share as an expense, the
    /// counterparty's share as a loan. The asset account drops by the total;
    /// the counterparty owes only their share.
    pub async fn expense_with_debt(
        &self,
        cmd: ExpenseWithDebtCmd,
    ) -> ResultEngine<(Entry, Entry)> {
        if cmd.their_share_minor <= 0 || cmd.their_share_minor >= cmd.total_minor {
            return Err(EngineError::InvalidInput(
                "their share must be positive and below the total".to_string(),
            ));
        }
        let own_share_minor = cmd.total_minor - cmd.their_share_minor;

        with_tx!(self, |db_tx| {
            require_money_account(&db_tx, &cmd.owner, cmd.account_id).await?;
            let receivable = self
                .find_or_create_counterparty_tx(
                    &db_tx,
                    &cmd.owner,
                    AccountKind::Receivable,
                    &cmd.counterparty,
                )
                .await?;

            let expense = Entry::expense(
                cmd.owner.clone(),
                cmd.date,
                own_share_minor,
                cmd.account_id,
                normalize_optional_text(cmd.category.as_deref()),
                normalize_optional_text(cmd.note.as_deref()),
            )?;
            self.insert_entry(&db_tx, &expense).await?;

            let mut loan = Entry::debt_op(
                cmd.owner.clone(),
                cmd.date,
                cmd.their_share_minor,
                cmd.account_id,
                receivable.id,
                DebtDirection::Lent,
                receivable.counterparty.clone().unwrap_or(cmd.counterparty),
                receivable.id,
                normalize_optional_text(cmd.note.as_deref()),
            )?;
            loan.category = normalize_optional_text(cmd.category.as_deref());
            self.insert_entry(&db_tx, &loan).await?;

            if cmd.due_date.is_some() {
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(receivable.id.to_string()),
                    due_date: ActiveValue::Set(cmd.due_date),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            self.sync_obligation_status(&db_tx, &cmd.owner, receivable.id)
                .await?;

            Ok((expense, loan))
        })
    }

    /// Obligation accounts with a nonzero outstanding amount.
    pub async fn outstanding_obligations(&self, owner: &str) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(owner.to_string()))
            .filter(
                accounts::Column::Kind
                    .is_in([AccountKind::Receivable.as_str(), AccountKind::Liability.as_str()]),
            )
            .filter(accounts::Column::BalanceMinor.ne(0))
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    /// Outstanding obligations whose due date has passed.
    pub async fn overdue_obligations(
        &self,
        owner: &str,
        today: NaiveDate,
    ) -> ResultEngine<Vec<Account>> {
        let outstanding = self.outstanding_obligations(owner).await?;
        Ok(outstanding
            .into_iter()
            .filter(|account| account.due_date.is_some_and(|due| due < today))
            .collect())
    }

    /// Close a settled obligation, reopen an unsettled one. Non-obligation
    /// accounts are left alone.
    pub(super) async fn sync_obligation_status(
        &self,
        db_tx: &DatabaseTransaction,
        owner: &str,
        account_id: Uuid,
    ) -> ResultEngine<()> {
        let model = require_account(db_tx, owner, account_id).await?;
        let kind = AccountKind::try_from(model.kind.as_str())?;
        if !kind.is_obligation() {
            return Ok(());
        }

        let status = if model.balance_minor == 0 {
            AccountStatus::Closed
        } else {
            AccountStatus::Active
        };
        if model.status != status.as_str() {
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(model.id),
                status: ActiveValue::Set(status.as_str().to_string()),
                ..Default::default()
            };
            active.update(db_tx).await?;
        }
        Ok(())
    }

    /// Write the settlement entry for a collection or repayment: receivable
    /// to asset for collections, asset to liability for repayments.
    async fn settle_entry(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &CollectCmd,
        obligation: &Account,
        amount_minor: i64,
    ) -> ResultEngine<Entry> {
        let counterparty = obligation
            .counterparty
            .clone()
            .unwrap_or_else(|| obligation.name.clone());
        let (from, to, direction) = match obligation.kind {
            AccountKind::Receivable => {
                (obligation.id, cmd.asset_account_id, DebtDirection::Returned)
            }
            AccountKind::Liability => {
                (cmd.asset_account_id, obligation.id, DebtDirection::Repaid)
            }
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "account '{}' is not a debt account",
                    obligation.name
                )));
            }
        };

        let entry = Entry::debt_op(
            cmd.owner.clone(),
            cmd.date,
            amount_minor,
            from,
            to,
            direction,
            counterparty,
            obligation.id,
            normalize_optional_text(cmd.note.as_deref()),
        )?;
        self.insert_entry(db_tx, &entry).await?;
        Ok(entry)
    }

    /// Write a forgiveness entry: expense-shaped against a receivable,
    /// income-shaped against a liability, driving the balance to zero
    /// through the normal delta path.
    async fn forgive_entry(
        &self,
        db_tx: &DatabaseTransaction,
        obligation: &Account,
        amount_minor: i64,
        date: NaiveDate,
        note: Option<String>,
    ) -> ResultEngine<Entry> {
        let counterparty = obligation
            .counterparty
            .clone()
            .unwrap_or_else(|| obligation.name.clone());
        let entry = match obligation.kind {
            AccountKind::Receivable => Entry::expense(
                obligation.owner.clone(),
                date,
                amount_minor,
                obligation.id,
                Some("debt forgiveness".to_string()),
                note,
            )?,
            AccountKind::Liability => Entry::income(
                obligation.owner.clone(),
                date,
                amount_minor,
                obligation.id,
                Some("debt forgiveness".to_string()),
                note,
            )?,
            _ => {
                return Err(EngineError::InvalidInput(format!(
                    "account '{}' is not a debt account",
                    obligation.name
                )));
            }
        };
        let entry = entry.with_debt_marker(DebtDirection::Forgiven, counterparty, obligation.id);
        self.insert_entry(db_tx, &entry).await?;
        Ok(entry)
    }
}

async fn require_obligation(
    db_tx: &DatabaseTransaction,
    owner: &str,
    account_id: Uuid,
    kind: AccountKind,
) -> ResultEngine<Account> {
    let model = require_account(db_tx, owner, account_id).await?;
    let account = Account::try_from(model)?;
    if account.kind != kind {
        return Err(EngineError::InvalidInput(format!(
            "account '{}' is not a {} account",
            account.name,
            kind.as_str()
        )));
    }
    Ok(account)
}
