//! Account balances, allowances and the global supply counters.

use std::collections::BTreeMap;

use carbon_types::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Global counters. Both only ever grow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyTotals {
    pub total_minted: u128,
    pub total_retired: u128,
}

impl SupplyTotals {
    /// Credits still in circulation.
    pub fn circulating(&self) -> u128 {
        self.total_minted.saturating_sub(self.total_retired)
    }
}

/// Balance map plus counters.
///
/// Zero balances are not stored, so the map only lists current holders.
/// Invariant: `sum(balances) == total_minted - total_retired`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceBook {
    balances: BTreeMap<AccountId, u128>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
    totals: SupplyTotals,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        balances: BTreeMap<AccountId, u128>,
        allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
        totals: SupplyTotals,
    ) -> Self {
        Self {
            balances,
            allowances,
            totals,
        }
    }

    pub fn balance_of(&self, who: &AccountId) -> u128 {
        self.balances.get(who).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn totals(&self) -> SupplyTotals {
        self.totals
    }

    pub fn balances(&self) -> &BTreeMap<AccountId, u128> {
        &self.balances
    }

    pub fn allowances(&self) -> &BTreeMap<AccountId, BTreeMap<AccountId, u128>> {
        &self.allowances
    }

    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Fails unless `who` holds at least `amount`; returns the current balance.
    pub fn require_balance(&self, who: &AccountId, amount: u128) -> Result<u128, LedgerError> {
        let available = self.balance_of(who);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(available)
    }

    pub(crate) fn set_balance(&mut self, who: &AccountId, value: u128) {
        if value == 0 {
            self.balances.remove(who);
        } else {
            self.balances.insert(who.clone(), value);
        }
    }

    pub(crate) fn set_allowance(&mut self, owner: &AccountId, spender: &AccountId, value: u128) {
        if value == 0 {
            if let Some(m) = self.allowances.get_mut(owner) {
                m.remove(spender);
                if m.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), value);
        }
    }

    pub(crate) fn set_totals(&mut self, totals: SupplyTotals) {
        self.totals = totals;
    }

    /// Post-transfer balances `(from, to)` for moving `amount`, without
    /// applying them. Handles `from == to`.
    pub(crate) fn plan_move(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(u128, u128), LedgerError> {
        let from_balance = self.require_balance(from, amount)?;
        if from == to {
            return Ok((from_balance, from_balance));
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok((from_balance - amount, to_balance))
    }

    /// Sum of all balances, or `None` if it does not fit in a `u128`.
    pub fn checked_sum(&self) -> Option<u128> {
        self.balances
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }

    /// Check conservation and counter ordering.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        let SupplyTotals {
            total_minted,
            total_retired,
        } = self.totals;
        if total_retired > total_minted {
            return Err(LedgerError::integrity(format!(
                "total retired {total_retired} exceeds total minted {total_minted}"
            )));
        }
        let sum = self
            .checked_sum()
            .ok_or_else(|| LedgerError::integrity("balance sum overflows"))?;
        if sum != total_minted - total_retired {
            return Err(LedgerError::integrity(format!(
                "balance sum {sum} does not equal minted {total_minted} - retired {total_retired}"
            )));
        }
        for (owner, spenders) in &self.allowances {
            if spenders.values().any(|v| *v == 0) {
                return Err(LedgerError::integrity(format!(
                    "zero allowance entry stored for {owner}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    fn bob() -> AccountId {
        AccountId::new("bob")
    }

    #[test]
    fn zero_balances_are_not_stored() {
        let mut book = BalanceBook::new();
        book.set_balance(&alice(), 5);
        assert_eq!(book.holder_count(), 1);
        book.set_balance(&alice(), 0);
        assert_eq!(book.holder_count(), 0);
        assert_eq!(book.balance_of(&alice()), 0);
    }

    #[test]
    fn plan_move_checks_balance() {
        let mut book = BalanceBook::new();
        book.set_balance(&alice(), 10);
        assert_eq!(book.plan_move(&alice(), &bob(), 4).unwrap(), (6, 4));
        assert_eq!(
            book.plan_move(&alice(), &bob(), 11),
            Err(LedgerError::InsufficientBalance {
                needed: 11,
                available: 10
            })
        );
        // Planning never mutates.
        assert_eq!(book.balance_of(&alice()), 10);
    }

    #[test]
    fn plan_move_to_self_keeps_balance() {
        let mut book = BalanceBook::new();
        book.set_balance(&alice(), 10);
        assert_eq!(book.plan_move(&alice(), &alice(), 7).unwrap(), (10, 10));
    }

    #[test]
    fn plan_move_detects_overflow() {
        let mut book = BalanceBook::new();
        book.set_balance(&alice(), 1);
        book.set_balance(&bob(), u128::MAX);
        assert_eq!(book.plan_move(&alice(), &bob(), 1), Err(LedgerError::Overflow));
    }

    #[test]
    fn invariants_detect_conservation_break() {
        let mut book = BalanceBook::new();
        book.set_balance(&alice(), 60);
        book.set_totals(SupplyTotals {
            total_minted: 100,
            total_retired: 40,
        });
        assert!(book.check_invariants().is_ok());

        book.set_balance(&bob(), 1);
        assert!(matches!(
            book.check_invariants(),
            Err(LedgerError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn invariants_detect_retired_above_minted() {
        let mut book = BalanceBook::new();
        book.set_totals(SupplyTotals {
            total_minted: 1,
            total_retired: 2,
        });
        assert!(matches!(
            book.check_invariants(),
            Err(LedgerError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn allowances_are_pruned_at_zero() {
        let mut book = BalanceBook::new();
        book.set_allowance(&alice(), &bob(), 3);
        assert_eq!(book.allowance(&alice(), &bob()), 3);
        book.set_allowance(&alice(), &bob(), 0);
        assert!(book.allowances().is_empty());
    }
}
