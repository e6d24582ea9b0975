//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists. Required fields go through
//! `new`; everything else is set with builder-style methods.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{AccountKind, AccountStatus, EntryKind};

/// Create an account.
#[derive(Clone, Debug)]
pub struct CreateAccountCmd {
    pub owner: String,
    pub name: String,
    pub kind: AccountKind,
    pub balance_minor: i64,
    pub credit_limit_minor: Option<i64>,
    pub counterparty: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl CreateAccountCmd {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            kind,
            balance_minor: 0,
            credit_limit_minor: None,
            counterparty: None,
            due_date: None,
        }
    }

    #[must_use]
    pub fn balance_minor(mut self, balance_minor: i64) -> Self {
        self.balance_minor = balance_minor;
        self
    }

    #[must_use]
    pub fn credit_limit_minor(mut self, credit_limit_minor: i64) -> Self {
        self.credit_limit_minor = Some(credit_limit_minor);
        self
    }

    #[must_use]
    pub fn counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Field patch for `update_account`. `None` fields are left unchanged.
///
/// `balance_minor` is an explicit balance correction outside the
/// entry-driven path; it is still checked against the sign invariant.
#[derive(Clone, Debug, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub balance_minor: Option<i64>,
    pub counterparty: Option<String>,
}

impl AccountPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn balance_minor(mut self, balance_minor: i64) -> Self {
        self.balance_minor = Some(balance_minor);
        self
    }

    #[must_use]
    pub fn counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }
}

/// Filters for listing accounts.
#[derive(Clone, Debug, Default)]
pub struct AccountListFilter {
    pub kind: Option<AccountKind>,
    pub status: Option<AccountStatus>,
    /// If true, includes archived accounts (default: false).
    pub include_hidden: bool,
}

/// Create an expense or income entry against a single account.
#[derive(Clone, Debug)]
pub struct SimpleEntryCmd {
    pub owner: String,
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl SimpleEntryCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            account_id,
            amount_minor,
            date,
            category: None,
            note: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Create a transfer entry between two accounts.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub owner: String,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            from_account_id,
            to_account_id,
            amount_minor,
            date,
            note: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Lend money to a named counterparty from an asset account.
#[derive(Clone, Debug)]
pub struct LendCmd {
    pub owner: String,
    pub source_account_id: Uuid,
    pub counterparty: String,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl LendCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        source_account_id: Uuid,
        counterparty: impl Into<String>,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            source_account_id,
            counterparty: counterparty.into(),
            amount_minor,
            date,
            due_date: None,
            note: None,
        }
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Borrow money from a named counterparty into an asset account.
#[derive(Clone, Debug)]
pub struct BorrowCmd {
    pub owner: String,
    pub destination_account_id: Uuid,
    pub counterparty: String,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl BorrowCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        destination_account_id: Uuid,
        counterparty: impl Into<String>,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            destination_account_id,
            counterparty: counterparty.into(),
            amount_minor,
            date,
            due_date: None,
            category: None,
            note: None,
        }
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Collect from a receivable / repay a liability for an exact amount.
#[derive(Clone, Debug)]
pub struct CollectCmd {
    pub owner: String,
    pub counterparty_account_id: Uuid,
    pub asset_account_id: Uuid,
    pub amount_minor: i64,
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl CollectCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        counterparty_account_id: Uuid,
        asset_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            counterparty_account_id,
            asset_account_id,
            amount_minor,
            date,
            note: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Collect/repay with smart over- and underpayment resolution.
#[derive(Clone, Debug)]
pub struct SmartCollectCmd {
    pub owner: String,
    pub counterparty_account_id: Uuid,
    pub asset_account_id: Uuid,
    pub amount_minor: i64,
    /// Forgive the remainder when the payment falls short.
    pub close_debt: bool,
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl SmartCollectCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        counterparty_account_id: Uuid,
        asset_account_id: Uuid,
        amount_minor: i64,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            counterparty_account_id,
            asset_account_id,
            amount_minor,
            close_debt: false,
            date,
            note: None,
        }
    }

    #[must_use]
    pub fn close_debt(mut self, close_debt: bool) -> Self {
        self.close_debt = close_debt;
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A shared expense: the full amount is paid from one account, a smaller
/// share of it is lent to a counterparty.
#[derive(Clone, Debug)]
pub struct ExpenseWithDebtCmd {
    pub owner: String,
    pub account_id: Uuid,
    pub total_minor: i64,
    pub their_share_minor: i64,
    pub counterparty: String,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub note: Option<String>,
}

impl ExpenseWithDebtCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        account_id: Uuid,
        total_minor: i64,
        their_share_minor: i64,
        counterparty: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            owner: owner.into(),
            account_id,
            total_minor,
            their_share_minor,
            counterparty: counterparty.into(),
            date,
            due_date: None,
            category: None,
            note: None,
        }
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Update an existing entry.
///
/// `expected_created_at` is the version token the entry was loaded with;
/// the write fails with `ConcurrentModification` if it no longer matches.
/// `None` fields are left unchanged. Kind and account references are
/// immutable and have no patch fields.
#[derive(Clone, Debug)]
pub struct UpdateEntryCmd {
    pub owner: String,
    pub entry_id: Uuid,
    pub expected_created_at: DateTime<Utc>,
    pub amount_minor: Option<i64>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateEntryCmd {
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        entry_id: Uuid,
        expected_created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: owner.into(),
            entry_id,
            expected_created_at,
            amount_minor: None,
            date: None,
            category: None,
            note: None,
            due_date: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// Filters for listing entries. Results are newest first.
#[derive(Clone, Debug, Default)]
pub struct EntryListFilter {
    pub account_id: Option<Uuid>,
    pub kind: Option<EntryKind>,
    /// If true, only entries that are part of a debt relationship.
    pub debt_only: bool,
    /// Inclusive lower bound on the entry date.
    pub from: Option<NaiveDate>,
    /// Exclusive upper bound on the entry date.
    pub to: Option<NaiveDate>,
    pub limit: Option<u64>,
}
