//! LMDB implementation of LedgerStore.
//!
//! State lives in keyed rows so a commit writes only what its delta names:
//! the header, touched balances and allowances, flipped verifiers, and
//! appended or stamped batches.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use heed::{Env, RoTxn};

use carbon_ledger::{CreditBatch, EventRecord, LedgerDelta, LedgerHeader, LedgerSnapshot};
use carbon_store::{LedgerStore, StoreError};
use carbon_types::{AccountId, BatchId};

use crate::environment::{AllowancesDb, BatchesDb, EventsDb, KeyedDb, VerifiersDb};
use crate::LmdbError;

pub(crate) const HEADER_KEY: &str = "header";

const ALLOWANCE_SEPARATOR: u8 = 0;

pub struct LmdbLedgerStore {
    pub(crate) env: Arc<Env>,
    pub(crate) state_db: KeyedDb,
    pub(crate) batches_db: BatchesDb,
    pub(crate) balances_db: KeyedDb,
    pub(crate) allowances_db: AllowancesDb,
    pub(crate) verifiers_db: VerifiersDb,
    pub(crate) events_db: EventsDb,
}

pub(crate) fn allowance_key(owner: &AccountId, spender: &AccountId) -> Vec<u8> {
    let (owner, spender) = (owner.as_str().as_bytes(), spender.as_str().as_bytes());
    let mut key = Vec::with_capacity(owner.len() + 1 + spender.len());
    key.extend_from_slice(owner);
    key.push(ALLOWANCE_SEPARATOR);
    key.extend_from_slice(spender);
    key
}

fn split_allowance_key(key: &[u8]) -> Result<(AccountId, AccountId), LmdbError> {
    let malformed = || LmdbError::Corruption(format!("malformed allowance key {key:?}"));
    let at = key
        .iter()
        .position(|b| *b == ALLOWANCE_SEPARATOR)
        .ok_or_else(malformed)?;
    let owner = std::str::from_utf8(&key[..at]).map_err(|_| malformed())?;
    let spender = std::str::from_utf8(&key[at + 1..]).map_err(|_| malformed())?;
    Ok((AccountId::new(owner), AccountId::new(spender)))
}

pub(crate) fn read_header(state_db: &KeyedDb, rtxn: &RoTxn) -> Result<Option<LedgerHeader>, LmdbError> {
    match state_db.get(rtxn, HEADER_KEY)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

impl LmdbLedgerStore {
    fn read_snapshot(&self) -> Result<Option<LedgerSnapshot>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let Some(header) = read_header(&self.state_db, &rtxn)? else {
            return Ok(None);
        };

        let mut verifiers = BTreeSet::new();
        for entry in self.verifiers_db.iter(&rtxn)? {
            let (who, ()) = entry?;
            verifiers.insert(AccountId::new(who));
        }

        let mut balances = BTreeMap::new();
        for entry in self.balances_db.iter(&rtxn)? {
            let (who, bytes) = entry?;
            balances.insert(AccountId::new(who), bincode::deserialize::<u128>(bytes)?);
        }

        let mut allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>> = BTreeMap::new();
        for entry in self.allowances_db.iter(&rtxn)? {
            let (key, bytes) = entry?;
            let (owner, spender) = split_allowance_key(key)?;
            let value: u128 = bincode::deserialize(bytes)?;
            allowances.entry(owner).or_default().insert(spender, value);
        }

        let mut batches: Vec<CreditBatch> = Vec::new();
        for (expected, entry) in (0u64..).zip(self.batches_db.iter(&rtxn)?) {
            let (key, bytes) = entry?;
            if key != BatchId::new(expected).to_be_bytes().as_slice() {
                return Err(LmdbError::Corruption(format!(
                    "batch keys are not contiguous at index {expected}"
                )));
            }
            batches.push(bincode::deserialize(bytes)?);
        }

        LedgerSnapshot::from_rows(header, verifiers, balances, allowances, batches)
            .map(Some)
            .map_err(|e| LmdbError::Corruption(e.to_string()))
    }

    fn write(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), LmdbError> {
        let header = bincode::serialize(&delta.header)?;
        let mut wtxn = self.env.write_txn()?;

        for event in events {
            if self.events_db.get(&wtxn, &event.sequence)?.is_some() {
                // Dropping `wtxn` aborts the transaction.
                return Err(LmdbError::Duplicate(format!("event {}", event.sequence)));
            }
            let bytes = bincode::serialize(event)?;
            self.events_db.put(&mut wtxn, &event.sequence, &bytes)?;
        }

        self.state_db.put(&mut wtxn, HEADER_KEY, &header)?;
        for (who, value) in &delta.balances {
            if *value == 0 {
                self.balances_db.delete(&mut wtxn, who.as_str())?;
            } else {
                self.balances_db
                    .put(&mut wtxn, who.as_str(), &bincode::serialize(value)?)?;
            }
        }
        for (owner, spender, value) in &delta.allowances {
            let key = allowance_key(owner, spender);
            if *value == 0 {
                self.allowances_db.delete(&mut wtxn, &key)?;
            } else {
                self.allowances_db
                    .put(&mut wtxn, &key, &bincode::serialize(value)?)?;
            }
        }
        for (who, member) in &delta.verifiers {
            if *member {
                self.verifiers_db.put(&mut wtxn, who.as_str(), &())?;
            } else {
                self.verifiers_db.delete(&mut wtxn, who.as_str())?;
            }
        }
        for (id, batch) in &delta.batches {
            self.batches_db
                .put(&mut wtxn, &id.to_be_bytes(), &bincode::serialize(batch)?)?;
        }
        wtxn.commit()?;

        tracing::trace!(
            events = events.len(),
            balances = delta.balances.len(),
            batches = delta.batches.len(),
            "committed ledger delta"
        );
        Ok(())
    }
}

impl LedgerStore for LmdbLedgerStore {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self.read_snapshot()?)
    }

    fn commit(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), StoreError> {
        Ok(self.write(delta, events)?)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.events_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        let iter = self
            .events_db
            .range(&rtxn, &(offset..))
            .map_err(LmdbError::from)?;
        for entry in iter.take(limit) {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            out.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowance_keys_split_back_into_identities() {
        let key = allowance_key(&AccountId::new("farm"), &AccountId::new("broker"));
        assert_eq!(key, b"farm\0broker");
        assert_eq!(
            split_allowance_key(&key).unwrap(),
            (AccountId::new("farm"), AccountId::new("broker"))
        );
        assert!(matches!(
            split_allowance_key(b"no-separator"),
            Err(LmdbError::Corruption(_))
        ));
    }
}
