//! Balance ledger and obligation engine.
//!
//! The engine keeps per-account balances consistent with the ledger at all
//! times: every entry insert/update/delete applies its minimal balance delta
//! inside the same database transaction as the entry write, so readers never
//! observe an entry without its balance effect (or vice versa).
//!
//! On top of the ledger it implements the debt lifecycle: lending and
//! borrowing against named counterparties, collection and repayment
//! (including smart over/underpayment resolution), forgiveness, and the
//! cascading deletion of a whole obligation relationship.

pub use accounts::{Account, AccountKind, AccountStatus};
pub use commands::{
    AccountListFilter, AccountPatch, BorrowCmd, CollectCmd, CreateAccountCmd, EntryListFilter,
    ExpenseWithDebtCmd, LendCmd, SimpleEntryCmd, SmartCollectCmd, TransferCmd, UpdateEntryCmd,
};
pub use entries::{DebtDirection, Entry, EntryKind};
pub use error::EngineError;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, SETTLE_TOLERANCE_MINOR};

pub mod accounts;
mod commands;
pub mod entries;
mod error;
mod money;
mod ops;
pub(crate) mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
