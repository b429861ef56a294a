//! Retirement engine: permanent removal of credits from circulation.
//!
//! Batch selection is global. A retirement stamps the oldest batch that is
//! still unretired, whoever the caller is and whatever the amount. Batch
//! retirement status therefore records the order in which retirements
//! happened, not which holder's units were extinguished. Once every batch is
//! stamped, retirements still burn balance but mark no batch.

use carbon_types::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::balances::SupplyTotals;
use crate::error::{InvalidArgument, LedgerError};
use crate::event::LedgerEvent;
use crate::ledger::CreditLedger;

/// Result of a successful retirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireReceipt {
    /// Caller balance after the retirement.
    pub balance: u128,
    /// Batch that received the retirement stamp.
    pub retired_batch: Option<BatchId>,
}

impl CreditLedger {
    /// Retire `amount` of `caller`'s credits with a human-readable `reason`.
    pub fn retire(
        &mut self,
        caller: &AccountId,
        amount: u128,
        reason: &str,
        now: Timestamp,
    ) -> Result<RetireReceipt, LedgerError> {
        self.access.ensure_active()?;
        if amount == 0 {
            return Err(InvalidArgument::ZeroAmount.into());
        }
        if reason.trim().is_empty() {
            return Err(InvalidArgument::EmptyReason.into());
        }
        let available = self.book.require_balance(caller, amount)?;
        let totals = self.book.totals();
        let total_retired = totals
            .total_retired
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        let balance = available - amount;
        self.write_balance(caller, balance);
        self.book.set_totals(SupplyTotals {
            total_retired,
            ..totals
        });
        let retired_batch = self.registry.retire_next(reason, now);

        match retired_batch {
            Some(batch) => {
                tracing::debug!(from = %caller, amount, batch = %batch, "retired credits")
            }
            None => {
                tracing::debug!(from = %caller, amount, "retired credits; no unretired batch left to stamp")
            }
        }
        self.emit(
            now,
            LedgerEvent::Retired {
                from: caller.clone(),
                amount,
                reason: reason.to_string(),
                batch_id: retired_batch,
            },
        );
        Ok(RetireReceipt {
            balance,
            retired_batch,
        })
    }
}
