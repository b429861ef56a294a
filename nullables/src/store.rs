//! Nullable store: thread-safe in-memory ledger storage for testing.

use carbon_ledger::{CreditBatch, EventRecord, LedgerDelta, LedgerHeader, LedgerSnapshot};
use carbon_store::{LedgerStore, MetaStore, StoreError};
use carbon_types::{AccountId, BatchId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Keyed ledger rows, laid out the way the LMDB backend stores them.
#[derive(Debug, Default)]
struct Rows {
    header: Option<LedgerHeader>,
    balances: BTreeMap<AccountId, u128>,
    allowances: BTreeMap<(AccountId, AccountId), u128>,
    verifiers: BTreeSet<AccountId>,
    batches: BTreeMap<BatchId, CreditBatch>,
}

/// An in-memory row store + event log + meta store.
///
/// `fail_next_commit` makes the following commit return a backend error
/// without writing, which lets tests exercise rollback paths.
#[derive(Debug, Default)]
pub struct NullStore {
    rows: Mutex<Rows>,
    events: Mutex<BTreeMap<u64, EventRecord>>,
    meta: Mutex<HashMap<String, Vec<u8>>>,
    fail_next: AtomicBool,
    commits: AtomicUsize,
    last_rows: AtomicUsize,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` call fail.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Balance, allowance, verifier and batch rows written by the last
    /// successful commit. The header is not counted.
    pub fn last_commit_rows(&self) -> usize {
        self.last_rows.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
}

impl LedgerStore for NullStore {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        let rows = lock(&self.rows)?;
        let Some(header) = rows.header.clone() else {
            return Ok(None);
        };
        let mut allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>> = BTreeMap::new();
        for ((owner, spender), value) in &rows.allowances {
            allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), *value);
        }
        LedgerSnapshot::from_rows(
            header,
            rows.verifiers.clone(),
            rows.balances.clone(),
            allowances,
            rows.batches.values().cloned().collect(),
        )
        .map(Some)
        .map_err(|e| StoreError::Corruption(e.to_string()))
    }

    fn commit(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let mut stored = lock(&self.events)?;
        if let Some(dup) = events.iter().find(|e| stored.contains_key(&e.sequence)) {
            return Err(StoreError::Duplicate(format!("event {}", dup.sequence)));
        }
        for event in events {
            stored.insert(event.sequence, event.clone());
        }

        let mut rows = lock(&self.rows)?;
        rows.header = Some(delta.header.clone());
        for (who, value) in &delta.balances {
            match value {
                0 => rows.balances.remove(who),
                v => rows.balances.insert(who.clone(), *v),
            };
        }
        for (owner, spender, value) in &delta.allowances {
            let key = (owner.clone(), spender.clone());
            match value {
                0 => rows.allowances.remove(&key),
                v => rows.allowances.insert(key, *v),
            };
        }
        for (who, member) in &delta.verifiers {
            if *member {
                rows.verifiers.insert(who.clone());
            } else {
                rows.verifiers.remove(who);
            }
        }
        for (id, batch) in &delta.batches {
            rows.batches.insert(*id, batch.clone());
        }

        self.last_rows.store(
            delta.balances.len() + delta.allowances.len() + delta.verifiers.len() + delta.batches.len(),
            Ordering::SeqCst,
        );
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.events)?.len() as u64)
    }

    fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        Ok(lock(&self.events)?
            .range(offset..)
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        lock(&self.meta)?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        lock(&self.meta)?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        match self.get_meta("schema_version") {
            Ok(bytes) => {
                let raw: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| StoreError::Corruption("schema_version is not 4 bytes".into()))?;
                Ok(u32::from_le_bytes(raw))
            }
            Err(StoreError::NotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta("schema_version", &version.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_ledger::{CreditLedger, MintRequest};
    use carbon_types::Timestamp;

    fn id(s: &str) -> AccountId {
        AccountId::new(s)
    }

    fn ledger() -> CreditLedger {
        let mut ledger = CreditLedger::new(id("owner")).unwrap();
        ledger
            .mint(&id("owner"), MintRequest::new(id("alice"), 10, "P", "V"), Timestamp::new(1))
            .unwrap();
        ledger
    }

    #[test]
    fn commit_then_load() {
        let store = NullStore::new();
        assert!(store.load_snapshot().unwrap().is_none());

        let mut ledger = ledger();
        let events = ledger.drain_events();
        store.commit(&ledger.take_changes(), &events).unwrap();

        assert_eq!(store.load_snapshot().unwrap(), Some(ledger.snapshot()));
        assert_eq!(store.event_count().unwrap(), 1);
        assert_eq!(store.event(0).unwrap(), events[0]);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.last_commit_rows(), 2);
    }

    #[test]
    fn zero_rows_are_removed() {
        let store = NullStore::new();
        let mut ledger = ledger();
        let t = Timestamp::new(2);
        ledger.approve(&id("alice"), &id("broker"), 4, t).unwrap();
        ledger.add_verifier(&id("owner"), &id("auditor"), t).unwrap();
        let events = ledger.drain_events();
        store.commit(&ledger.take_changes(), &events).unwrap();

        ledger.transfer(&id("alice"), &id("bob"), 10, t).unwrap();
        ledger.approve(&id("alice"), &id("broker"), 0, t).unwrap();
        ledger.remove_verifier(&id("owner"), &id("auditor"), t).unwrap();
        let events = ledger.drain_events();
        store.commit(&ledger.take_changes(), &events).unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, ledger.snapshot());
        assert!(!loaded.balances.contains_key(&id("alice")));
        assert!(loaded.allowances.is_empty());
        assert!(loaded.verifiers.is_empty());
    }

    #[test]
    fn injected_failure_writes_nothing_and_clears() {
        let store = NullStore::new();
        let mut ledger = ledger();
        let events = ledger.drain_events();
        let delta = ledger.take_changes();

        store.fail_next_commit();
        assert!(matches!(store.commit(&delta, &events), Err(StoreError::Backend(_))));
        assert!(store.load_snapshot().unwrap().is_none());
        assert_eq!(store.event_count().unwrap(), 0);

        store.commit(&delta, &events).unwrap();
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let store = NullStore::new();
        let mut ledger = ledger();
        let events = ledger.drain_events();
        let delta = ledger.take_changes();
        store.commit(&delta, &events).unwrap();
        assert!(matches!(store.commit(&delta, &events), Err(StoreError::Duplicate(_))));
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn schema_version_defaults_to_zero() {
        let store = NullStore::new();
        assert_eq!(store.get_schema_version().unwrap(), 0);
        store.set_schema_version(3).unwrap();
        assert_eq!(store.get_schema_version().unwrap(), 3);
    }
}
