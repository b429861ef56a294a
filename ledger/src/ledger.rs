//! The credit ledger: state, transfers, allowances, role and pause operations,
//! and the read-only query surface.
//!
//! Mutating operations follow one order: halt flag, then role/ownership, then
//! operation-specific preconditions, then the state delta, then the event.
//! Every check (including overflow) runs before the first write, so a failed
//! call changes nothing.

use carbon_types::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::access::{AccessControl, Role};
use crate::balances::{BalanceBook, SupplyTotals};
use crate::changes::{ChangeJournal, LedgerHeader};
use crate::error::{InvalidArgument, LedgerError};
use crate::event::{EventRecord, LedgerEvent};
use crate::registry::{BatchRegistry, CreditBatch};

/// Balances after a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from_balance: u128,
    pub to_balance: u128,
}

#[derive(Clone, Debug)]
pub struct CreditLedger {
    pub(crate) access: AccessControl,
    pub(crate) book: BalanceBook,
    pub(crate) registry: BatchRegistry,
    pub(crate) next_sequence: u64,
    pub(crate) pending_events: Vec<EventRecord>,
    pub(crate) journal: ChangeJournal,
}

// The journal is commit bookkeeping, not ledger state.
impl PartialEq for CreditLedger {
    fn eq(&self, other: &Self) -> bool {
        self.access == other.access
            && self.book == other.book
            && self.registry == other.registry
            && self.next_sequence == other.next_sequence
            && self.pending_events == other.pending_events
    }
}

impl Eq for CreditLedger {}

impl CreditLedger {
    /// A fresh ledger: `owner` fixed, active, counters zero, no balances.
    pub fn new(owner: AccountId) -> Result<Self, LedgerError> {
        Ok(Self::from_parts(
            AccessControl::new(owner)?,
            BalanceBook::new(),
            BatchRegistry::new(),
            0,
        ))
    }

    pub(crate) fn from_parts(
        access: AccessControl,
        book: BalanceBook,
        registry: BatchRegistry,
        next_sequence: u64,
    ) -> Self {
        let base = LedgerHeader::of(&access, &book, &registry, next_sequence);
        Self {
            access,
            book,
            registry,
            next_sequence,
            pending_events: Vec::new(),
            journal: ChangeJournal::new(base),
        }
    }

    // ── Transfers ────────────────────────────────────────────────────────

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<TransferReceipt, LedgerError> {
        self.access.ensure_active()?;
        to.validate().map_err(InvalidArgument::InvalidRecipient)?;
        if amount == 0 {
            return Err(InvalidArgument::ZeroAmount.into());
        }
        let (from_balance, to_balance) = self.book.plan_move(caller, to, amount)?;

        self.write_balance(caller, from_balance);
        self.write_balance(to, to_balance);
        tracing::debug!(from = %caller, to = %to, amount, "transferred credits");
        self.emit(
            now,
            LedgerEvent::Transferred {
                from: caller.clone(),
                to: to.clone(),
                amount,
                spender: None,
            },
        );
        Ok(TransferReceipt {
            from_balance,
            to_balance,
        })
    }

    /// Set `caller`'s allowance for `spender`, replacing any previous value.
    ///
    /// Moves no credits, so it stays available while halted.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        caller.validate().map_err(InvalidArgument::InvalidIdentity)?;
        spender.validate().map_err(InvalidArgument::InvalidIdentity)?;

        self.write_allowance(caller, spender, amount);
        tracing::debug!(owner = %caller, spender = %spender, amount, "approved spender");
        self.emit(
            now,
            LedgerEvent::Approved {
                owner: caller.clone(),
                spender: spender.clone(),
                amount,
            },
        );
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `from`, consuming
    /// `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<TransferReceipt, LedgerError> {
        self.access.ensure_active()?;
        to.validate().map_err(InvalidArgument::InvalidRecipient)?;
        if amount == 0 {
            return Err(InvalidArgument::ZeroAmount.into());
        }
        let allowance = self.book.allowance(from, caller);
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                needed: amount,
                available: allowance,
            });
        }
        let (from_balance, to_balance) = self.book.plan_move(from, to, amount)?;

        self.write_allowance(from, caller, allowance - amount);
        self.write_balance(from, from_balance);
        self.write_balance(to, to_balance);
        tracing::debug!(spender = %caller, from = %from, to = %to, amount, "transferred credits via allowance");
        self.emit(
            now,
            LedgerEvent::Transferred {
                from: from.clone(),
                to: to.clone(),
                amount,
                spender: Some(caller.clone()),
            },
        );
        Ok(TransferReceipt {
            from_balance,
            to_balance,
        })
    }

    // ── Access / pause control ──────────────────────────────────────────

    pub fn add_verifier(
        &mut self,
        caller: &AccountId,
        who: &AccountId,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.access.check_add_verifier(caller, who)?;
        self.note_verifier(who);
        self.access.set_verifier(who, true);
        tracing::debug!(verifier = %who, "verifier added");
        self.emit(
            now,
            LedgerEvent::VerifierAdded {
                account: who.clone(),
                by: caller.clone(),
            },
        );
        Ok(())
    }

    pub fn remove_verifier(
        &mut self,
        caller: &AccountId,
        who: &AccountId,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        self.access.check_remove_verifier(caller, who)?;
        self.note_verifier(who);
        self.access.set_verifier(who, false);
        tracing::debug!(verifier = %who, "verifier removed");
        self.emit(
            now,
            LedgerEvent::VerifierRemoved {
                account: who.clone(),
                by: caller.clone(),
            },
        );
        Ok(())
    }

    pub fn pause(&mut self, caller: &AccountId, now: Timestamp) -> Result<(), LedgerError> {
        self.access.pause(caller)?;
        tracing::debug!("ledger halted");
        self.emit(now, LedgerEvent::Paused { by: caller.clone() });
        Ok(())
    }

    pub fn unpause(&mut self, caller: &AccountId, now: Timestamp) -> Result<(), LedgerError> {
        self.access.unpause(caller)?;
        tracing::debug!("ledger resumed");
        self.emit(now, LedgerEvent::Unpaused { by: caller.clone() });
        Ok(())
    }

    // ── Queries (always available) ──────────────────────────────────────

    pub fn balance_of(&self, who: &AccountId) -> u128 {
        self.book.balance_of(who)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.book.allowance(owner, spender)
    }

    pub fn batch(&self, id: BatchId) -> Result<&CreditBatch, LedgerError> {
        self.registry.get(id)
    }

    pub fn batches(&self, offset: u64, limit: usize) -> Vec<(BatchId, &CreditBatch)> {
        self.registry.page(offset, limit)
    }

    pub fn batch_count(&self) -> u64 {
        self.registry.len() as u64
    }

    pub fn next_unretired_batch(&self) -> Option<BatchId> {
        self.registry.next_unretired()
    }

    pub fn role_of(&self, who: &AccountId) -> Role {
        self.access.role_of(who)
    }

    pub fn is_verifier(&self, who: &AccountId) -> bool {
        self.access.is_verifier(who)
    }

    pub fn owner(&self) -> &AccountId {
        self.access.owner()
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn is_halted(&self) -> bool {
        self.access.is_halted()
    }

    pub fn totals(&self) -> SupplyTotals {
        self.book.totals()
    }

    pub fn total_supply(&self) -> u128 {
        self.book.totals().circulating()
    }

    pub fn holder_count(&self) -> usize {
        self.book.holder_count()
    }

    /// Sequence number the next emitted event will carry.
    pub fn next_event_sequence(&self) -> u64 {
        self.next_sequence
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Take the events emitted since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.pending_events)
    }

    pub(crate) fn emit(&mut self, now: Timestamp, event: LedgerEvent) {
        let record = EventRecord {
            sequence: self.next_sequence,
            timestamp: now,
            event,
            totals: self.book.totals(),
        };
        self.next_sequence += 1;
        self.pending_events.push(record);
    }

    // ── Integrity ───────────────────────────────────────────────────────

    /// Re-check every structural invariant. A failure means the state was
    /// corrupted outside the operation set.
    pub fn verify_integrity(&self) -> Result<(), LedgerError> {
        self.access
            .owner()
            .validate()
            .map_err(|e| LedgerError::integrity(format!("owner identity: {e}")))?;
        if let Some(bad) = self.access.verifiers().iter().find(|v| !v.is_valid()) {
            return Err(LedgerError::integrity(format!("invalid verifier identity {bad:?}")));
        }
        if let Some((bad, _)) = self.book.balances().iter().find(|(k, _)| !k.is_valid()) {
            return Err(LedgerError::integrity(format!("balance held by invalid identity {bad:?}")));
        }
        for (owner, spenders) in self.book.allowances() {
            if !owner.is_valid() {
                return Err(LedgerError::integrity(format!(
                    "allowance granted by invalid identity {owner:?}"
                )));
            }
            if let Some(bad) = spenders.keys().find(|s| !s.is_valid()) {
                return Err(LedgerError::integrity(format!(
                    "allowance granted to invalid identity {bad:?}"
                )));
            }
        }
        self.book.check_invariants()?;
        self.registry.check_invariants(self.book.totals().total_minted)
    }
}
