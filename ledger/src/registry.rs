//! Append-only registry of issuance batches.
//!
//! One [`CreditBatch`] per successful mint, addressed by its mint sequence
//! number. The only post-creation mutation is the one-way retirement stamp,
//! applied to the lowest-indexed unretired batch. Because retirement always
//! takes that batch, the registry splits into a fully retired prefix and a
//! fully unretired suffix; `next_unretired` is the boundary, which keeps
//! retirement O(1) instead of rescanning history.

use carbon_types::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Provenance metadata for one mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBatch {
    pub project_id: String,
    pub verification_id: String,
    /// Time the batch was minted.
    pub verification_timestamp: Timestamp,
    pub methodology: String,
    pub location: String,
    pub vintage_year: u32,
    /// Quantity issued by the mint that created this batch.
    pub amount: u128,
    /// Initial recipient of the minted credits.
    pub recipient: AccountId,
    pub retired: bool,
    pub retirement_reason: String,
    /// [`Timestamp::EPOCH`] until retired.
    pub retirement_timestamp: Timestamp,
}

impl CreditBatch {
    fn has_retirement_stamp(&self) -> bool {
        !self.retirement_reason.is_empty() || self.retirement_timestamp != Timestamp::EPOCH
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchRegistry {
    batches: Vec<CreditBatch>,
    next_unretired: usize,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(batches: Vec<CreditBatch>, next_unretired: usize) -> Self {
        Self {
            batches,
            next_unretired,
        }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Id the next appended batch will receive.
    pub fn next_id(&self) -> BatchId {
        BatchId::new(self.batches.len() as u64)
    }

    /// Lowest-indexed batch that is not yet retired, if any.
    pub fn next_unretired(&self) -> Option<BatchId> {
        (self.next_unretired < self.batches.len()).then(|| BatchId::new(self.next_unretired as u64))
    }

    pub(crate) fn cursor(&self) -> usize {
        self.next_unretired
    }

    pub fn get(&self, id: BatchId) -> Result<&CreditBatch, LedgerError> {
        usize::try_from(id.index())
            .ok()
            .and_then(|i| self.batches.get(i))
            .ok_or(LedgerError::BatchNotFound(id))
    }

    pub fn batches(&self) -> &[CreditBatch] {
        &self.batches
    }

    /// Up to `limit` batches starting at `offset`, in mint order.
    pub fn page(&self, offset: u64, limit: usize) -> Vec<(BatchId, &CreditBatch)> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        self.batches
            .iter()
            .enumerate()
            .skip(start)
            .take(limit)
            .map(|(i, b)| (BatchId::new(i as u64), b))
            .collect()
    }

    pub(crate) fn append(&mut self, batch: CreditBatch) -> BatchId {
        let id = self.next_id();
        self.batches.push(batch);
        id
    }

    /// Stamp the oldest unretired batch and advance the cursor.
    pub(crate) fn retire_next(&mut self, reason: &str, now: Timestamp) -> Option<BatchId> {
        let index = self.next_unretired;
        let batch = self.batches.get_mut(index)?;
        batch.retired = true;
        batch.retirement_reason = reason.to_string();
        batch.retirement_timestamp = now;
        self.next_unretired += 1;
        Some(BatchId::new(index as u64))
    }

    /// Drop batches past `len` and clear stamps at or after `cursor`.
    pub(crate) fn rewind(&mut self, len: usize, cursor: usize) {
        self.batches.truncate(len);
        let stamped_end = self.next_unretired.min(len);
        for batch in self.batches.iter_mut().take(stamped_end).skip(cursor) {
            batch.retired = false;
            batch.retirement_reason.clear();
            batch.retirement_timestamp = Timestamp::EPOCH;
        }
        self.next_unretired = cursor;
    }

    /// Check the prefix/suffix split and that issued quantities add up.
    pub fn check_invariants(&self, total_minted: u128) -> Result<(), LedgerError> {
        if self.next_unretired > self.batches.len() {
            return Err(LedgerError::integrity(format!(
                "retirement cursor {} beyond batch count {}",
                self.next_unretired,
                self.batches.len()
            )));
        }
        for (i, batch) in self.batches.iter().enumerate() {
            if i < self.next_unretired {
                if !batch.retired || batch.retirement_reason.is_empty() {
                    return Err(LedgerError::integrity(format!(
                        "batch {i} precedes the retirement cursor but is not retired"
                    )));
                }
            } else if batch.retired || batch.has_retirement_stamp() {
                return Err(LedgerError::integrity(format!(
                    "batch {i} follows the retirement cursor but carries a retirement stamp"
                )));
            }
            if batch.amount == 0 || batch.project_id.is_empty() || batch.verification_id.is_empty() {
                return Err(LedgerError::integrity(format!(
                    "batch {i} has an empty amount or identifier"
                )));
            }
        }
        let issued = self
            .batches
            .iter()
            .try_fold(0u128, |acc, b| acc.checked_add(b.amount))
            .ok_or_else(|| LedgerError::integrity("issued batch amounts overflow"))?;
        if issued != total_minted {
            return Err(LedgerError::integrity(format!(
                "batches issue {issued} credits but total minted is {total_minted}"
            )));
        }
        Ok(())
    }
}
