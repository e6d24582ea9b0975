//! Account primitives.
//!
//! An account is a place money lives (asset, savings) or an obligation
//! relationship with a named counterparty (receivable, liability). The
//! `balance_minor` column is denormalized: it always equals the net effect
//! of the entries referencing the account, and is mutated only by the
//! balance maintenance procedure.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Asset,
    Savings,
    Receivable,
    Liability,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Savings => "savings",
            Self::Receivable => "receivable",
            Self::Liability => "liability",
        }
    }

    /// Receivable and liability accounts track a debt relationship.
    #[must_use]
    pub fn is_obligation(self) -> bool {
        matches!(self, Self::Receivable | Self::Liability)
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "asset" => Ok(Self::Asset),
            "savings" => Ok(Self::Savings),
            "receivable" => Ok(Self::Receivable),
            "liability" => Ok(Self::Liability),
            other => Err(EngineError::InvalidInput(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Closed,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl TryFrom<&str> for AccountStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid account status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier, generated once and persisted so the account can be
    /// renamed without breaking references.
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub kind: AccountKind,
    pub balance_minor: i64,
    /// Available-credit accounting; asset accounts only.
    pub credit_limit_minor: Option<i64>,
    /// Person or entity name; receivable/liability only.
    pub counterparty: Option<String>,
    /// Expected settlement date for obligations.
    pub due_date: Option<NaiveDate>,
    pub hidden: bool,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            kind,
            balance_minor: 0,
            credit_limit_minor: None,
            counterparty: None,
            due_date: None,
            hidden: false,
            status: AccountStatus::Active,
        }
    }

    /// Outstanding magnitude of an obligation (always >= 0).
    #[must_use]
    pub fn outstanding_minor(&self) -> i64 {
        self.balance_minor.abs()
    }
}

/// Balance-sign invariant per account kind.
///
/// A receivable counts down toward zero as it is collected and must never go
/// negative; a liability counts up toward zero as it is repaid and must never
/// go positive. Asset/savings balances are unconstrained (credit accounts may
/// be negative relative to their limit).
pub(crate) fn check_sign_invariant(
    kind: AccountKind,
    balance_minor: i64,
    name: &str,
) -> ResultEngine<()> {
    match kind {
        AccountKind::Receivable if balance_minor < 0 => Err(EngineError::InvariantViolation(
            format!(
                "receivable '{name}' would go negative ({})",
                MoneyCents::new(balance_minor)
            ),
        )),
        AccountKind::Liability if balance_minor > 0 => Err(EngineError::InvariantViolation(
            format!(
                "liability '{name}' would go positive ({})",
                MoneyCents::new(balance_minor)
            ),
        )),
        _ => Ok(()),
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner: String,
    pub name: String,
    pub kind: String,
    pub balance_minor: i64,
    pub credit_limit_minor: Option<i64>,
    pub counterparty: Option<String>,
    pub due_date: Option<Date>,
    pub hidden: bool,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            owner: ActiveValue::Set(account.owner.clone()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            balance_minor: ActiveValue::Set(account.balance_minor),
            credit_limit_minor: ActiveValue::Set(account.credit_limit_minor),
            counterparty: ActiveValue::Set(account.counterparty.clone()),
            due_date: ActiveValue::Set(account.due_date),
            hidden: ActiveValue::Set(account.hidden),
            status: ActiveValue::Set(account.status.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            owner: model.owner,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            balance_minor: model.balance_minor,
            credit_limit_minor: model.credit_limit_minor,
            counterparty: model.counterparty,
            due_date: model.due_date,
            hidden: model.hidden,
            status: AccountStatus::try_from(model.status.as_str())?,
        })
    }
}
