//! End-to-end node tests: operations flow through the ledger, get committed
//! to storage, and reach subscribers and metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use carbon_ledger::{
    CreditLedger, EventRecord, LedgerDelta, LedgerError, LedgerEvent, LedgerSnapshot, MintRequest,
};
use carbon_node::{CarbonNode, NodeConfig, NodeError, StorageBackend};
use carbon_nullables::{NullClock, NullStore};
use carbon_store::{LedgerStore, StoreError};
use carbon_types::{AccountId, BatchId, Timestamp};

fn id(s: &str) -> AccountId {
    AccountId::new(s)
}

fn config() -> NodeConfig {
    NodeConfig {
        owner: Some(id("owner")),
        storage: StorageBackend::Memory,
        ..NodeConfig::default()
    }
}

fn node_with(store: Arc<NullStore>, clock: Arc<NullClock>) -> CarbonNode {
    CarbonNode::with_store(config(), Box::new(store), clock).expect("node")
}

fn mint(node: &mut CarbonNode, to: &str, amount: u128) {
    node.mint(&id("owner"), MintRequest::new(id(to), amount, "PRJ-1", "VER-1"))
        .expect("mint");
}

#[test]
fn fresh_store_without_owner_is_refused() {
    let cfg = NodeConfig {
        storage: StorageBackend::Memory,
        ..NodeConfig::default()
    };
    let err = CarbonNode::with_store(cfg, Box::new(NullStore::new()), Arc::new(NullClock::new(0)))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::MissingOwner));
}

#[test]
fn fresh_ledger_is_committed_immediately() {
    let store = Arc::new(NullStore::new());
    let node = node_with(store.clone(), Arc::new(NullClock::new(0)));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.load_snapshot().unwrap().unwrap(), node.ledger().snapshot());
}

#[test]
fn operations_are_committed_with_their_events() {
    let store = Arc::new(NullStore::new());
    let clock = Arc::new(NullClock::new(100));
    let mut node = node_with(store.clone(), clock.clone());

    mint(&mut node, "farm", 1_000);
    clock.advance(10);
    let receipt = node.retire(&id("farm"), 400, "2026 offset").unwrap();
    assert_eq!(receipt.retired_batch, Some(BatchId::new(0)));
    node.transfer(&id("farm"), &id("buyer"), 100).unwrap();

    assert_eq!(node.ledger().balance_of(&id("farm")), 500);
    assert_eq!(node.ledger().balance_of(&id("buyer")), 100);
    assert_eq!(node.ledger().total_supply(), 600);

    let events = node.events(0, 10).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].timestamp, Timestamp::new(100));
    assert_eq!(events[1].timestamp, Timestamp::new(110));
    assert!(matches!(events[2].event, LedgerEvent::Transferred { spender: None, .. }));
    assert_eq!(store.load_snapshot().unwrap().unwrap(), node.ledger().snapshot());

    let metrics = node.metrics();
    assert_eq!(metrics.mints.get(), 1);
    assert_eq!(metrics.retirements.get(), 1);
    assert_eq!(metrics.transfers.get(), 1);
    assert_eq!(metrics.circulating.get(), 600);
}

#[test]
fn rejected_operation_commits_nothing() {
    let store = Arc::new(NullStore::new());
    let mut node = node_with(store.clone(), Arc::new(NullClock::new(0)));

    let err = node
        .mint(&id("stranger"), MintRequest::new(id("farm"), 5, "P", "V"))
        .unwrap_err();
    assert!(matches!(err, NodeError::Ledger(LedgerError::Unauthorized { .. })));
    assert_eq!(store.commit_count(), 1);
    assert_eq!(node.event_count().unwrap(), 0);

    let text = node.metrics().encode().unwrap();
    assert!(text.contains("carbon_rejected_operations_total{code=\"UNAUTHORIZED\"} 1"));
}

#[test]
fn failed_commit_rolls_back_the_ledger() {
    let store = Arc::new(NullStore::new());
    let mut node = node_with(store.clone(), Arc::new(NullClock::new(0)));
    mint(&mut node, "farm", 50);
    let before = node.ledger().clone();

    store.fail_next_commit();
    let err = node.retire(&id("farm"), 20, "offset").unwrap_err();
    assert!(matches!(err, NodeError::Store(StoreError::Backend(_))));
    assert_eq!(node.ledger(), &before);
    assert_eq!(node.ledger().balance_of(&id("farm")), 50);
    assert_eq!(node.event_count().unwrap(), 1);

    // The sequence continues without a gap once storage recovers.
    node.retire(&id("farm"), 20, "offset").unwrap();
    let events = node.events(0, 10).unwrap();
    assert_eq!(events.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn failed_commit_reverts_mints_stamps_and_roles() {
    let store = Arc::new(NullStore::new());
    let mut node = node_with(store.clone(), Arc::new(NullClock::new(0)));
    node.add_verifier(&id("owner"), &id("auditor")).unwrap();
    mint(&mut node, "farm", 50);
    node.approve(&id("farm"), &id("broker"), 9).unwrap();
    let before = node.ledger().clone();

    store.fail_next_commit();
    assert!(node.mint(&id("auditor"), MintRequest::new(id("farm"), 5, "P2", "V2")).is_err());
    store.fail_next_commit();
    assert!(node.retire(&id("farm"), 1, "offset").is_err());
    store.fail_next_commit();
    assert!(node.transfer_from(&id("broker"), &id("farm"), &id("buyer"), 9).is_err());
    store.fail_next_commit();
    assert!(node.remove_verifier(&id("owner"), &id("auditor")).is_err());

    assert_eq!(node.ledger(), &before);
    assert_eq!(node.ledger().batch_count(), 1);
    assert!(!node.ledger().batch(BatchId::new(0)).unwrap().retired);
    assert_eq!(store.load_snapshot().unwrap().unwrap(), before.snapshot());
    node.ledger().verify_integrity().unwrap();
}

/// Delegates to a [`NullStore`] and remembers the encoded size of the last
/// commit.
#[derive(Default)]
struct SizeRecorder {
    inner: NullStore,
    last_bytes: AtomicU64,
}

impl LedgerStore for SizeRecorder {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        self.inner.load_snapshot()
    }

    fn commit(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), StoreError> {
        let bytes = bincode::serialized_size(delta).unwrap() + bincode::serialized_size(events).unwrap();
        self.last_bytes.store(bytes, Ordering::SeqCst);
        self.inner.commit(delta, events)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        self.inner.event_count()
    }

    fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        self.inner.events(offset, limit)
    }
}

#[test]
fn retire_commit_size_does_not_grow_with_issuance_history() {
    let retire_commit = |batches: u64| {
        let store = Arc::new(SizeRecorder::default());
        let mut node =
            CarbonNode::with_store(config(), Box::new(store.clone()), Arc::new(NullClock::new(0)))
                .unwrap();
        for _ in 0..batches {
            mint(&mut node, "farm", 10);
        }
        node.retire(&id("farm"), 1, "offset").unwrap();
        (store.last_bytes.load(Ordering::SeqCst), store.inner.last_commit_rows())
    };

    let (small_bytes, small_rows) = retire_commit(10);
    let (large_bytes, large_rows) = retire_commit(2_000);
    assert_eq!(small_rows, 2);
    assert_eq!(large_rows, 2);
    assert_eq!(small_bytes, large_bytes);
}

#[test]
fn subscribers_see_only_committed_events() {
    let store = Arc::new(NullStore::new());
    let mut node = node_with(store.clone(), Arc::new(NullClock::new(0)));
    let seen = Arc::new(AtomicU64::new(0));
    let s = Arc::clone(&seen);
    node.subscribe(Box::new(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    }));

    mint(&mut node, "farm", 10);
    store.fail_next_commit();
    assert!(node.pause(&id("owner")).is_err());
    assert!(node.transfer(&id("farm"), &id("farm"), 0).is_err());

    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(!node.ledger().is_halted());
}

#[test]
fn restart_resumes_from_the_store() {
    let store = Arc::new(NullStore::new());
    let clock = Arc::new(NullClock::new(0));
    {
        let mut node = node_with(store.clone(), clock.clone());
        node.add_verifier(&id("owner"), &id("auditor")).unwrap();
        node.mint(&id("auditor"), MintRequest::new(id("farm"), 75, "P", "V"))
            .unwrap();
        node.pause(&id("owner")).unwrap();
    }

    let cfg = NodeConfig {
        owner: Some(id("someone-else")),
        ..config()
    };
    let mut node = CarbonNode::with_store(cfg, Box::new(store.clone()), clock).unwrap();
    assert_eq!(node.ledger().owner(), &id("owner"));
    assert!(node.ledger().is_verifier(&id("auditor")));
    assert!(node.ledger().is_halted());
    assert_eq!(node.ledger().balance_of(&id("farm")), 75);

    node.unpause(&id("owner")).unwrap();
    assert_eq!(node.event_count().unwrap(), 4);
}

#[test]
fn snapshot_and_event_log_out_of_step_is_refused() {
    let store = Arc::new(NullStore::new());
    let mut node = node_with(store.clone(), Arc::new(NullClock::new(0)));
    mint(&mut node, "farm", 10);

    let mut ahead = CreditLedger::new(id("owner")).unwrap();
    ahead
        .mint(&id("owner"), MintRequest::new(id("farm"), 10, "P", "V"), Timestamp::new(0))
        .unwrap();
    ahead.drain_events();
    let stale = Arc::new(NullStore::new());
    stale.commit(&ahead.take_changes(), &[]).unwrap();
    let err = CarbonNode::with_store(config(), Box::new(stale), Arc::new(NullClock::new(0)))
        .err()
        .unwrap();
    assert!(matches!(err, NodeError::Corrupted(_)));
}

#[test]
fn status_reports_uptime_and_counts() {
    let clock = Arc::new(NullClock::new(1_000));
    let mut node = node_with(Arc::new(NullStore::new()), clock.clone());
    mint(&mut node, "farm", 10);
    clock.advance(3_600);

    let status = node.status().unwrap();
    assert_eq!(status.owner, id("owner"));
    assert_eq!(status.batch_count, 1);
    assert_eq!(status.event_count, 1);
    assert_eq!(status.holder_count, 1);
    assert_eq!(status.uptime_secs, 3_600);
    assert!(!status.halted);
}

#[test]
fn lmdb_backed_node_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = NodeConfig {
        owner: Some(id("owner")),
        data_dir: dir.path().to_path_buf(),
        storage: StorageBackend::Lmdb,
        lmdb_map_size: 64 * 1024 * 1024,
        ..NodeConfig::default()
    };

    {
        let mut node = CarbonNode::open(cfg.clone()).unwrap();
        mint(&mut node, "farm", 300);
        node.retire(&id("farm"), 100, "scope 1").unwrap();
    }

    let node = CarbonNode::open(cfg).unwrap();
    assert_eq!(node.ledger().balance_of(&id("farm")), 200);
    assert_eq!(node.ledger().totals().total_retired, 100);
    assert!(node.ledger().batch(BatchId::new(0)).unwrap().retired);
    assert_eq!(node.event_count().unwrap(), 2);
}

#[test]
fn memory_backend_opens_without_touching_disk() {
    let node = CarbonNode::open(config()).unwrap();
    assert_eq!(node.ledger().owner(), &id("owner"));
    assert_eq!(node.event_count().unwrap(), 0);
}
