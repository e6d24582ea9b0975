//! The module contains the errors the engine can throw.
//!
//! Every failure is reported to the caller with enough detail to decide
//! whether to retry, fix the input, or escalate; none are fatal to the
//! running process. Multi-step operations never persist partial state: an
//! error before commit rolls the whole database transaction back.

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rejected before any write; recoverable by correcting the input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A write would push a receivable negative or a liability positive.
    /// Rejected, never silently clamped.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Optimistic-lock mismatch on an entry edit; reload and retry.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    /// Delete refused because dependent data exists: an account that still
    /// has entries, or a debt entry whose relationship must be cascade-
    /// deleted as a whole. Archive the account or use the cascade path.
    #[error("dependent data present: {0}")]
    DependentDataPresent(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvariantViolation(a), Self::InvariantViolation(b)) => a == b,
            (Self::ConcurrentModification(a), Self::ConcurrentModification(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::DependentDataPresent(a), Self::DependentDataPresent(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
