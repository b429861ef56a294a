//! Issuance authority: minting credits against a verified project record.

use carbon_types::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::balances::SupplyTotals;
use crate::error::{InvalidArgument, LedgerError};
use crate::event::LedgerEvent;
use crate::ledger::CreditLedger;
use crate::registry::CreditBatch;

/// A finished, verified issuance record handed over by the MRV pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub to: AccountId,
    pub amount: u128,
    pub project_id: String,
    pub verification_id: String,
    #[serde(default)]
    pub methodology: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub vintage_year: u32,
}

impl MintRequest {
    pub fn new(
        to: AccountId,
        amount: u128,
        project_id: impl Into<String>,
        verification_id: impl Into<String>,
    ) -> Self {
        Self {
            to,
            amount,
            project_id: project_id.into(),
            verification_id: verification_id.into(),
            methodology: String::new(),
            location: String::new(),
            vintage_year: 0,
        }
    }

    pub fn methodology(mut self, methodology: impl Into<String>) -> Self {
        self.methodology = methodology.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn vintage_year(mut self, year: u32) -> Self {
        self.vintage_year = year;
        self
    }

    fn validate(&self) -> Result<(), InvalidArgument> {
        self.to.validate().map_err(InvalidArgument::InvalidRecipient)?;
        if self.amount == 0 {
            return Err(InvalidArgument::ZeroAmount);
        }
        if self.project_id.trim().is_empty() {
            return Err(InvalidArgument::MissingProjectId);
        }
        if self.verification_id.trim().is_empty() {
            return Err(InvalidArgument::MissingVerificationId);
        }
        Ok(())
    }
}

/// Result of a successful mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub batch_id: BatchId,
    /// Recipient balance after the mint.
    pub balance: u128,
}

impl CreditLedger {
    /// Mint `request.amount` new credits to `request.to` and record the batch.
    ///
    /// Only the owner or a registered verifier may mint. The new batch gets
    /// the next sequential id.
    pub fn mint(
        &mut self,
        caller: &AccountId,
        request: MintRequest,
        now: Timestamp,
    ) -> Result<MintReceipt, LedgerError> {
        self.access.ensure_active()?;
        self.access.require_minter(caller)?;
        request.validate()?;

        let totals = self.book.totals();
        let total_minted = totals
            .total_minted
            .checked_add(request.amount)
            .ok_or(LedgerError::Overflow)?;
        let balance = self
            .book
            .balance_of(&request.to)
            .checked_add(request.amount)
            .ok_or(LedgerError::Overflow)?;

        let MintRequest {
            to,
            amount,
            project_id,
            verification_id,
            methodology,
            location,
            vintage_year,
        } = request;

        let batch_id = self.registry.append(CreditBatch {
            project_id: project_id.clone(),
            verification_id: verification_id.clone(),
            verification_timestamp: now,
            methodology,
            location,
            vintage_year,
            amount,
            recipient: to.clone(),
            retired: false,
            retirement_reason: String::new(),
            retirement_timestamp: Timestamp::EPOCH,
        });
        self.write_balance(&to, balance);
        self.book.set_totals(SupplyTotals {
            total_minted,
            ..totals
        });

        tracing::debug!(to = %to, amount, batch = %batch_id, project = %project_id, "minted credits");
        self.emit(
            now,
            LedgerEvent::Minted {
                to,
                amount,
                batch_id,
                project_id,
                verification_id,
                minted_by: caller.clone(),
            },
        );
        Ok(MintReceipt { batch_id, balance })
    }
}
