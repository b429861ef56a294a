//! Serializable ledger state.
//!
//! A snapshot holds exactly the state an operation can change, so a ledger
//! rebuilt from one behaves identically to the one that produced it. Loading
//! re-checks every invariant and refuses corrupted state.

use std::collections::{BTreeMap, BTreeSet};

use carbon_types::AccountId;
use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::balances::{BalanceBook, SupplyTotals};
use crate::changes::LedgerHeader;
use crate::error::LedgerError;
use crate::ledger::CreditLedger;
use crate::registry::{BatchRegistry, CreditBatch};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub owner: AccountId,
    pub verifiers: BTreeSet<AccountId>,
    pub halted: bool,
    pub total_minted: u128,
    pub total_retired: u128,
    pub balances: BTreeMap<AccountId, u128>,
    pub allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
    pub batches: Vec<CreditBatch>,
    pub next_unretired_index: u64,
    pub next_event_sequence: u64,
}

impl LedgerSnapshot {
    /// Reassemble a snapshot from a committed header and its keyed rows.
    ///
    /// Fails if the row set does not match the header's batch count.
    pub fn from_rows(
        header: LedgerHeader,
        verifiers: BTreeSet<AccountId>,
        balances: BTreeMap<AccountId, u128>,
        allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
        batches: Vec<CreditBatch>,
    ) -> Result<Self, LedgerError> {
        if batches.len() as u64 != header.batch_count {
            return Err(LedgerError::integrity(format!(
                "header lists {} batches, store holds {}",
                header.batch_count,
                batches.len()
            )));
        }
        Ok(Self {
            version: header.version,
            owner: header.owner,
            verifiers,
            halted: header.halted,
            total_minted: header.total_minted,
            total_retired: header.total_retired,
            balances,
            allowances,
            batches,
            next_unretired_index: header.next_unretired_index,
            next_event_sequence: header.next_event_sequence,
        })
    }
}

impl CreditLedger {
    /// Capture the current state. Pending (undrained) events are not part of it.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let totals = self.book.totals();
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            owner: self.access.owner().clone(),
            verifiers: self.access.verifiers().clone(),
            halted: self.access.is_halted(),
            total_minted: totals.total_minted,
            total_retired: totals.total_retired,
            balances: self.book.balances().clone(),
            allowances: self.book.allowances().clone(),
            batches: self.registry.batches().to_vec(),
            next_unretired_index: self.registry.cursor() as u64,
            next_event_sequence: self.next_sequence,
        }
    }

    /// Rebuild a ledger from a snapshot, rejecting any state that violates a
    /// ledger invariant with [`LedgerError::IntegrityViolation`].
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::integrity(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        let cursor = usize::try_from(snapshot.next_unretired_index)
            .map_err(|_| LedgerError::integrity("retirement cursor does not fit in memory"))?;
        let ledger = Self::from_parts(
            AccessControl::from_parts(snapshot.owner, snapshot.verifiers, snapshot.halted),
            BalanceBook::from_parts(
                snapshot.balances,
                snapshot.allowances,
                SupplyTotals {
                    total_minted: snapshot.total_minted,
                    total_retired: snapshot.total_retired,
                },
            ),
            BatchRegistry::from_parts(snapshot.batches, cursor),
            snapshot.next_event_sequence,
        );
        ledger.verify_integrity()?;
        Ok(ledger)
    }
}
