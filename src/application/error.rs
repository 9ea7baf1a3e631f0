use thiserror::Error;

use crate::domain::{Cents, GroupId, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Balance sheet for group {group_id} violates the zero-sum invariant ({residual_cents} cents left over)")]
    InvariantViolation {
        group_id: GroupId,
        residual_cents: Cents,
    },

    #[error("Concurrent mutation detected for group {group_id}; retry against a fresh read")]
    ConcurrencyConflict { group_id: GroupId },

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Group already exists: {0}")]
    GroupAlreadyExists(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("{member} is not a member of group {group}")]
    NotAGroupMember { group: String, member: String },

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("{member} still has a non-zero balance ({balance_cents} cents) and cannot be removed")]
    MemberHasBalance {
        member: String,
        balance_cents: Cents,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Map a domain error surfaced while mutating a specific group's
    /// balances. Validation failures become `InvalidInput`; a broken
    /// zero-sum is corruption and keeps its own kind.
    pub fn from_ledger(err: LedgerError, group_id: GroupId) -> Self {
        match err {
            LedgerError::Unbalanced { residual_cents } => AppError::InvariantViolation {
                group_id,
                residual_cents,
            },
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}
