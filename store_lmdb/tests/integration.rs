use carbon_ledger::{CreditLedger, MintRequest};
use carbon_store::{LedgerStore, MetaStore, StoreError};
use carbon_store_lmdb::environment::DEFAULT_MAP_SIZE;
use carbon_store_lmdb::migration::CURRENT_SCHEMA_VERSION;
use carbon_store_lmdb::{check_integrity, LmdbEnvironment, LmdbError};
use carbon_types::{AccountId, Timestamp};

fn id(s: &str) -> AccountId {
    AccountId::new(s)
}

fn ledger_with_history() -> CreditLedger {
    let mut ledger = CreditLedger::new(id("owner")).unwrap();
    ledger
        .mint(&id("owner"), MintRequest::new(id("alice"), 100, "P1", "V1"), Timestamp::new(10))
        .unwrap();
    ledger.retire(&id("alice"), 25, "offset", Timestamp::new(20)).unwrap();
    ledger.transfer(&id("alice"), &id("bob"), 5, Timestamp::new(30)).unwrap();
    ledger
}

#[test]
fn fresh_store_has_no_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store = env.ledger_store();
    assert!(store.load_snapshot().unwrap().is_none());
    assert_eq!(store.event_count().unwrap(), 0);
    assert_eq!(
        env.meta_store().get_schema_version().unwrap(),
        CURRENT_SCHEMA_VERSION
    );
}

#[test]
fn commit_persists_rows_and_events_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_with_history();
    let events = ledger.drain_events();
    let delta = ledger.take_changes();

    {
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        env.ledger_store().commit(&delta, &events).unwrap();
    }

    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store = env.ledger_store();
    let loaded = store.load_snapshot().unwrap().unwrap();
    assert_eq!(loaded, ledger.snapshot());
    assert_eq!(CreditLedger::from_snapshot(loaded).unwrap(), ledger);
    assert_eq!(store.event_count().unwrap(), 3);
    assert_eq!(store.events(0, 10).unwrap(), events);
    assert_eq!(store.event(1).unwrap().event.name(), "retired");

    let report = check_integrity(&env).unwrap();
    assert!(report.is_healthy(), "{:?}", report.errors);
    assert_eq!(report.databases_checked, 7);
}

#[test]
fn successive_deltas_rebuild_the_full_state() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store = env.ledger_store();
    let mut ledger = CreditLedger::new(id("owner")).unwrap();
    let commit = |ledger: &mut CreditLedger| {
        let events = ledger.drain_events();
        store.commit(&ledger.take_changes(), &events).unwrap();
    };
    commit(&mut ledger);

    let t = Timestamp::new(1);
    ledger.add_verifier(&id("owner"), &id("auditor"), t).unwrap();
    for i in 0..4 {
        ledger
            .mint(&id("auditor"), MintRequest::new(id("farm"), 10, format!("P{i}"), "V"), t)
            .unwrap();
    }
    commit(&mut ledger);

    ledger.approve(&id("farm"), &id("broker"), 8, t).unwrap();
    ledger.retire(&id("farm"), 2, "offset", t).unwrap();
    commit(&mut ledger);

    ledger
        .transfer_from(&id("broker"), &id("farm"), &id("buyer"), 8, t)
        .unwrap();
    ledger.remove_verifier(&id("owner"), &id("auditor"), t).unwrap();
    ledger.retire(&id("buyer"), 8, "offset", t).unwrap();
    ledger.pause(&id("owner"), t).unwrap();
    commit(&mut ledger);

    let loaded = store.load_snapshot().unwrap().unwrap();
    assert_eq!(loaded, ledger.snapshot());
    assert!(loaded.allowances.is_empty());
    assert!(loaded.verifiers.is_empty());
    assert!(!loaded.balances.contains_key(&id("buyer")));
    assert_eq!(loaded.batches.iter().filter(|b| b.retired).count(), 2);
    assert!(check_integrity(&env).unwrap().is_healthy());
}

#[test]
fn events_are_paged_by_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store = env.ledger_store();
    let mut ledger = ledger_with_history();
    let events = ledger.drain_events();
    store.commit(&ledger.take_changes(), &events).unwrap();

    let page = store.events(1, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].sequence, 1);
    assert_eq!(store.events(2, 10).unwrap().len(), 1);
    assert!(store.events(3, 10).unwrap().is_empty());
    assert!(matches!(store.event(7), Err(StoreError::NotFound(_))));
}

#[test]
fn duplicate_event_aborts_the_whole_commit() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let store = env.ledger_store();
    let mut ledger = ledger_with_history();
    let events = ledger.drain_events();
    store.commit(&ledger.take_changes(), &events).unwrap();
    let first = ledger.snapshot();

    ledger.retire(&id("alice"), 1, "again", Timestamp::new(40)).unwrap();
    let mut replayed = events.clone();
    replayed.extend(ledger.drain_events());
    let err = store.commit(&ledger.take_changes(), &replayed).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));

    assert_eq!(store.load_snapshot().unwrap().unwrap(), first);
    assert_eq!(store.event_count().unwrap(), 3);
}

#[test]
fn meta_values_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
    let meta = env.meta_store();
    meta.put_meta("node_id", b"carbon-1").unwrap();
    assert_eq!(meta.get_meta("node_id").unwrap(), b"carbon-1");
    assert!(matches!(meta.get_meta("missing"), Err(StoreError::NotFound(_))));
}

#[test]
fn refuses_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    {
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        env.meta_store()
            .set_schema_version(CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
    }
    assert!(matches!(
        LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE),
        Err(LmdbError::SchemaTooNew { found, supported })
            if found == CURRENT_SCHEMA_VERSION + 1 && supported == CURRENT_SCHEMA_VERSION
    ));
}
