//! Write-set tracking between commit points.
//!
//! Operations record the prior value of every balance, allowance and verifier
//! entry they overwrite. [`CreditLedger::take_changes`] turns that journal
//! into a [`LedgerDelta`] holding only the rows that changed, and
//! [`CreditLedger::revert_changes`] puts the prior values back. Batches need
//! no journal: the registry only appends and stamps forward from the cursor,
//! so the header saved at the last commit point bounds what changed.

use std::collections::BTreeMap;

use carbon_types::{AccountId, BatchId};
use serde::{Deserialize, Serialize};

use crate::access::AccessControl;
use crate::balances::{BalanceBook, SupplyTotals};
use crate::ledger::CreditLedger;
use crate::registry::{BatchRegistry, CreditBatch};
use crate::snapshot::SNAPSHOT_VERSION;

/// Fixed-size ledger scalars. Every commit rewrites them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub version: u32,
    pub owner: AccountId,
    pub halted: bool,
    pub total_minted: u128,
    pub total_retired: u128,
    pub batch_count: u64,
    pub next_unretired_index: u64,
    pub next_event_sequence: u64,
}

impl LedgerHeader {
    pub(crate) fn of(
        access: &AccessControl,
        book: &BalanceBook,
        registry: &BatchRegistry,
        next_event_sequence: u64,
    ) -> Self {
        let totals = book.totals();
        Self {
            version: SNAPSHOT_VERSION,
            owner: access.owner().clone(),
            halted: access.is_halted(),
            total_minted: totals.total_minted,
            total_retired: totals.total_retired,
            batch_count: registry.len() as u64,
            next_unretired_index: registry.cursor() as u64,
            next_event_sequence,
        }
    }
}

/// Rows written since the last commit point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub header: LedgerHeader,
    /// Current balance of each touched account. Zero removes the row.
    pub balances: Vec<(AccountId, u128)>,
    /// `(owner, spender, allowance)`. Zero removes the row.
    pub allowances: Vec<(AccountId, AccountId, u128)>,
    /// Verifier membership after the change.
    pub verifiers: Vec<(AccountId, bool)>,
    /// Appended or newly stamped batches, in id order.
    pub batches: Vec<(BatchId, CreditBatch)>,
}

/// Prior values, keyed by the row they came from. Only the first write to a
/// row inside one window is kept.
#[derive(Clone, Debug)]
pub(crate) struct ChangeJournal {
    base: LedgerHeader,
    balances: BTreeMap<AccountId, u128>,
    allowances: BTreeMap<(AccountId, AccountId), u128>,
    verifiers: BTreeMap<AccountId, bool>,
}

impl ChangeJournal {
    pub(crate) fn new(base: LedgerHeader) -> Self {
        Self {
            base,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            verifiers: BTreeMap::new(),
        }
    }
}

impl CreditLedger {
    /// Current scalar state.
    pub fn header(&self) -> LedgerHeader {
        LedgerHeader::of(&self.access, &self.book, &self.registry, self.next_sequence)
    }

    /// Everything written since the last commit point, without closing the
    /// window. The cost is proportional to the rows touched, not to the size
    /// of the ledger.
    pub fn pending_changes(&self) -> LedgerDelta {
        let journal = &self.journal;
        let base_len = journal.base.batch_count as usize;
        let base_cursor = journal.base.next_unretired_index as usize;
        let stamped = base_cursor..self.registry.cursor().min(base_len);
        let appended = base_len..self.registry.len();
        let batches = stamped
            .chain(appended)
            .filter_map(|i| {
                self.registry
                    .batches()
                    .get(i)
                    .map(|b| (BatchId::new(i as u64), b.clone()))
            })
            .collect();

        LedgerDelta {
            header: self.header(),
            balances: journal
                .balances
                .keys()
                .map(|who| (who.clone(), self.book.balance_of(who)))
                .collect(),
            allowances: journal
                .allowances
                .keys()
                .map(|(owner, spender)| {
                    (owner.clone(), spender.clone(), self.book.allowance(owner, spender))
                })
                .collect(),
            verifiers: journal
                .verifiers
                .keys()
                .map(|who| (who.clone(), self.access.is_verifier(who)))
                .collect(),
            batches,
        }
    }

    /// Mark the current state as committed and start a new window.
    pub fn settle_changes(&mut self) {
        self.journal = ChangeJournal::new(self.header());
    }

    /// [`CreditLedger::pending_changes`] followed by
    /// [`CreditLedger::settle_changes`].
    pub fn take_changes(&mut self) -> LedgerDelta {
        let delta = self.pending_changes();
        self.settle_changes();
        delta
    }

    /// Undo every write since the last commit point and
    /// drop undrained events.
    pub fn revert_changes(&mut self) {
        let base = self.journal.base.clone();
        let journal = std::mem::replace(&mut self.journal, ChangeJournal::new(base.clone()));

        for (who, prior) in journal.balances {
            self.book.set_balance(&who, prior);
        }
        for ((owner, spender), prior) in journal.allowances {
            self.book.set_allowance(&owner, &spender, prior);
        }
        for (who, member) in journal.verifiers {
            self.access.set_verifier(&who, member);
        }
        self.access.set_halted(base.halted);
        self.book.set_totals(SupplyTotals {
            total_minted: base.total_minted,
            total_retired: base.total_retired,
        });
        self.registry.rewind(
            base.batch_count as usize,
            base.next_unretired_index as usize,
        );
        self.next_sequence = base.next_event_sequence;
        self.pending_events.clear();
    }

    pub(crate) fn write_balance(&mut self, who: &AccountId, value: u128) {
        let prior = self.book.balance_of(who);
        self.journal.balances.entry(who.clone()).or_insert(prior);
        self.book.set_balance(who, value);
    }

    pub(crate) fn write_allowance(&mut self, owner: &AccountId, spender: &AccountId, value: u128) {
        let prior = self.book.allowance(owner, spender);
        self.journal
            .allowances
            .entry((owner.clone(), spender.clone()))
            .or_insert(prior);
        self.book.set_allowance(owner, spender, value);
    }

    /// Record that `who`'s verifier membership is about to flip.
    pub(crate) fn note_verifier(&mut self, who: &AccountId) {
        let prior = self.access.is_verifier(who);
        self.journal.verifiers.entry(who.clone()).or_insert(prior);
    }
}
