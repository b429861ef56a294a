//! Ledger errors.
//!
//! Every error is local to the operation that raised it: a failed call leaves
//! balances, counters, registry and role set exactly as they were.

use carbon_types::{AccountId, BatchId, TypesError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        caller: AccountId,
        action: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, have {available}")]
    InsufficientAllowance { needed: u128, available: u128 },

    #[error("batch {0} not found")]
    BatchNotFound(BatchId),

    #[error("{0} is already a verifier")]
    AlreadyInRole(AccountId),

    #[error("{0} is not a verifier")]
    NotInRole(AccountId),

    #[error("ledger is halted")]
    Halted,

    #[error("ledger is not halted")]
    NotHalted,

    #[error("arithmetic overflow in credit accounting")]
    Overflow,

    #[error("ledger integrity violation: {0}")]
    IntegrityViolation(String),
}

/// The specific malformed input behind [`LedgerError::InvalidArgument`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(TypesError),

    #[error("invalid identity: {0}")]
    InvalidIdentity(TypesError),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("project id must not be empty")]
    MissingProjectId,

    #[error("verification id must not be empty")]
    MissingVerificationId,

    #[error("retirement reason must not be empty")]
    EmptyReason,
}

impl LedgerError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            Self::BatchNotFound(_) => "NOT_FOUND",
            Self::AlreadyInRole(_) => "ALREADY_IN_ROLE",
            Self::NotInRole(_) => "NOT_IN_ROLE",
            Self::Halted => "HALTED",
            Self::NotHalted => "NOT_HALTED",
            Self::Overflow => "OVERFLOW",
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
        }
    }

    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_converts_into_ledger_error() {
        let err: LedgerError = InvalidArgument::ZeroAmount.into();
        assert_eq!(err.kind(), "INVALID_ARGUMENT");
        assert_eq!(
            err.to_string(),
            "invalid argument: amount must be greater than zero"
        );
    }

    #[test]
    fn unauthorized_message_names_caller_and_action() {
        let err = LedgerError::Unauthorized {
            caller: AccountId::new("mallory"),
            action: "mint credits",
        };
        assert_eq!(err.to_string(), "mallory is not authorized to mint credits");
    }
}
