//! Audit-trail events emitted by successful operations.

use carbon_types::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::balances::SupplyTotals;

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        to: AccountId,
        amount: u128,
        batch_id: BatchId,
        project_id: String,
        verification_id: String,
        minted_by: AccountId,
    },
    Retired {
        from: AccountId,
        amount: u128,
        reason: String,
        /// Batch that received the retirement stamp, if any was left unretired.
        batch_id: Option<BatchId>,
    },
    Transferred {
        from: AccountId,
        to: AccountId,
        amount: u128,
        /// Set when an approved spender moved the credits.
        spender: Option<AccountId>,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        amount: u128,
    },
    VerifierAdded {
        account: AccountId,
        by: AccountId,
    },
    VerifierRemoved {
        account: AccountId,
        by: AccountId,
    },
    Paused {
        by: AccountId,
    },
    Unpaused {
        by: AccountId,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minted { .. } => "minted",
            Self::Retired { .. } => "retired",
            Self::Transferred { .. } => "transferred",
            Self::Approved { .. } => "approved",
            Self::VerifierAdded { .. } => "verifier_added",
            Self::VerifierRemoved { .. } => "verifier_removed",
            Self::Paused { .. } => "paused",
            Self::Unpaused { .. } => "unpaused",
        }
    }
}

/// An immutable, ordered entry in the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Gap-free ledger-wide sequence number, starting at 0.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: LedgerEvent,
    /// Counters after the operation was applied.
    pub totals: SupplyTotals,
}
