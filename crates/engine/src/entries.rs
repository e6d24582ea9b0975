//! Ledger entry primitives.
//!
//! An [`Entry`] is one recorded event: an expense, an income, a transfer
//! between two accounts, or a debt operation. Expense/income entries target a
//! single account; transfer/debt entries reference a source and a destination
//! account. Amounts are stored as positive integer minor units; the sign of
//! the balance effect comes from the entry's kind, not the amount.
//!
//! `kind` and the account references are immutable after creation - editing
//! them would invalidate balance history. The `created_at` timestamp doubles
//! as the optimistic-lock version token and is refreshed by every successful
//! edit.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Expense,
    Income,
    Transfer,
    DebtOp,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
            Self::DebtOp => "debt_op",
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            "debt_op" => Ok(Self::DebtOp),
            other => Err(EngineError::InvalidInput(format!(
                "invalid entry kind: {other}"
            ))),
        }
    }
}

/// Which way money moved in a debt-flagged entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtDirection {
    Lent,
    Borrowed,
    Returned,
    Repaid,
    Forgiven,
}

impl DebtDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lent => "lent",
            Self::Borrowed => "borrowed",
            Self::Returned => "returned",
            Self::Repaid => "repaid",
            Self::Forgiven => "forgiven",
        }
    }
}

impl TryFrom<&str> for DebtDirection {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "lent" => Ok(Self::Lent),
            "borrowed" => Ok(Self::Borrowed),
            "returned" => Ok(Self::Returned),
            "repaid" => Ok(Self::Repaid),
            "forgiven" => Ok(Self::Forgiven),
            other => Err(EngineError::InvalidInput(format!(
                "invalid debt direction: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub owner: String,
    pub date: NaiveDate,
    pub kind: EntryKind,
    /// Always positive; direction of the balance effect follows `kind`.
    pub amount_minor: i64,
    /// Target account for expense/income.
    pub account_id: Option<Uuid>,
    /// Source account for transfer/debt_op.
    pub from_account_id: Option<Uuid>,
    /// Destination account for transfer/debt_op.
    pub to_account_id: Option<Uuid>,
    pub category: Option<String>,
    pub is_debt: bool,
    pub direction: Option<DebtDirection>,
    /// Denormalized counterparty label, kept for display even if the account
    /// is later renamed or archived.
    pub counterparty: Option<String>,
    /// The counterparty account this entry affects (debt entries only).
    pub related_account_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub note: Option<String>,
    /// Creation timestamp; also the optimistic-lock version token.
    pub created_at: DateTime<Utc>,
}

fn require_positive(amount_minor: i64) -> ResultEngine<()> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidInput(
            "amount_minor must be > 0".to_string(),
        ));
    }
    Ok(())
}

impl Entry {
    fn base(owner: String, date: NaiveDate, kind: EntryKind, amount_minor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            date,
            kind,
            amount_minor,
            account_id: None,
            from_account_id: None,
            to_account_id: None,
            category: None,
            is_debt: false,
            direction: None,
            counterparty: None,
            related_account_id: None,
            due_date: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn expense(
        owner: impl Into<String>,
        date: NaiveDate,
        amount_minor: i64,
        account_id: Uuid,
        category: Option<String>,
        note: Option<String>,
    ) -> ResultEngine<Self> {
        require_positive(amount_minor)?;
        let mut entry = Self::base(owner.into(), date, EntryKind::Expense, amount_minor);
        entry.account_id = Some(account_id);
        entry.category = category;
        entry.note = note;
        Ok(entry)
    }

    pub fn income(
        owner: impl Into<String>,
        date: NaiveDate,
        amount_minor: i64,
        account_id: Uuid,
        category: Option<String>,
        note: Option<String>,
    ) -> ResultEngine<Self> {
        require_positive(amount_minor)?;
        let mut entry = Self::base(owner.into(), date, EntryKind::Income, amount_minor);
        entry.account_id = Some(account_id);
        entry.category = category;
        entry.note = note;
        Ok(entry)
    }

    pub fn transfer(
        owner: impl Into<String>,
        date: NaiveDate,
        amount_minor: i64,
        from_account_id: Uuid,
        to_account_id: Uuid,
        note: Option<String>,
    ) -> ResultEngine<Self> {
        require_positive(amount_minor)?;
        if from_account_id == to_account_id {
            return Err(EngineError::InvalidInput(
                "source and destination accounts must differ".to_string(),
            ));
        }
        let mut entry = Self::base(owner.into(), date, EntryKind::Transfer, amount_minor);
        entry.from_account_id = Some(from_account_id);
        entry.to_account_id = Some(to_account_id);
        entry.note = note;
        Ok(entry)
    }

    /// A debt operation moving `amount_minor` between an asset account and a
    /// counterparty (receivable/liability) account.
    #[allow(clippy::too_many_arguments)]
    pub fn debt_op(
        owner: impl Into<String>,
        date: NaiveDate,
        amount_minor: i64,
        from_account_id: Uuid,
        to_account_id: Uuid,
        direction: DebtDirection,
        counterparty: String,
        related_account_id: Uuid,
        note: Option<String>,
    ) -> ResultEngine<Self> {
        require_positive(amount_minor)?;
        if from_account_id == to_account_id {
            return Err(EngineError::InvalidInput(
                "source and destination accounts must differ".to_string(),
            ));
        }
        let mut entry = Self::base(owner.into(), date, EntryKind::DebtOp, amount_minor);
        entry.from_account_id = Some(from_account_id);
        entry.to_account_id = Some(to_account_id);
        entry.is_debt = true;
        entry.direction = Some(direction);
        entry.counterparty = Some(counterparty);
        entry.related_account_id = Some(related_account_id);
        entry.note = note;
        Ok(entry)
    }

    /// Marks a single-account entry (expense/income shape) as part of a debt
    /// relationship. Used for forgiveness entries and overpayment records.
    pub(crate) fn with_debt_marker(
        mut self,
        direction: DebtDirection,
        counterparty: String,
        related_account_id: Uuid,
    ) -> Self {
        self.is_debt = true;
        self.direction = Some(direction);
        self.counterparty = Some(counterparty);
        self.related_account_id = Some(related_account_id);
        self
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner: String,
    pub date: Date,
    pub kind: String,
    pub amount_minor: i64,
    pub account_id: Option<String>,
    pub from_account_id: Option<String>,
    pub to_account_id: Option<String>,
    pub category: Option<String>,
    pub is_debt: bool,
    pub direction: Option<String>,
    pub counterparty: Option<String>,
    pub related_account_id: Option<String>,
    pub due_date: Option<Date>,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Entry> for ActiveModel {
    fn from(entry: &Entry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            owner: ActiveValue::Set(entry.owner.clone()),
            date: ActiveValue::Set(entry.date),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(entry.amount_minor),
            account_id: ActiveValue::Set(entry.account_id.map(|id| id.to_string())),
            from_account_id: ActiveValue::Set(entry.from_account_id.map(|id| id.to_string())),
            to_account_id: ActiveValue::Set(entry.to_account_id.map(|id| id.to_string())),
            category: ActiveValue::Set(entry.category.clone()),
            is_debt: ActiveValue::Set(entry.is_debt),
            direction: ActiveValue::Set(entry.direction.map(|d| d.as_str().to_string())),
            counterparty: ActiveValue::Set(entry.counterparty.clone()),
            related_account_id: ActiveValue::Set(
                entry.related_account_id.map(|id| id.to_string()),
            ),
            due_date: ActiveValue::Set(entry.due_date),
            note: ActiveValue::Set(entry.note.clone()),
            created_at: ActiveValue::Set(entry.created_at),
        }
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let parse_opt = |value: &Option<String>, label: &str| -> ResultEngine<Option<Uuid>> {
            value.as_deref().map(|v| parse_uuid(v, label)).transpose()
        };

        Ok(Self {
            id: parse_uuid(&model.id, "entry")?,
            owner: model.owner,
            date: model.date,
            kind: EntryKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            account_id: parse_opt(&model.account_id, "account")?,
            from_account_id: parse_opt(&model.from_account_id, "account")?,
            to_account_id: parse_opt(&model.to_account_id, "account")?,
            category: model.category,
            is_debt: model.is_debt,
            direction: model
                .direction
                .as_deref()
                .map(DebtDirection::try_from)
                .transpose()?,
            counterparty: model.counterparty,
            related_account_id: parse_opt(&model.related_account_id, "account")?,
            due_date: model.due_date,
            note: model.note,
            created_at: model.created_at,
        })
    }
}
