//! End-to-end ledger scenarios.

use carbon_ledger::{CreditLedger, LedgerError, MintRequest};
use carbon_types::{AccountId, BatchId, Timestamp};

fn id(s: &str) -> AccountId {
    AccountId::new(s)
}

fn owner() -> AccountId {
    id("owner")
}

#[test]
fn mint_retire_mint_retire() {
    let mut ledger = CreditLedger::new(owner()).unwrap();

    ledger
        .mint(
            &owner(),
            MintRequest::new(id("A"), 100, "P1", "VER-P1")
                .methodology("IPCC 2019 Tier 1")
                .location("Pune, IN")
                .vintage_year(2023),
            Timestamp::new(1_000),
        )
        .unwrap();
    assert_eq!(ledger.balance_of(&id("A")), 100);
    assert_eq!(ledger.totals().total_minted, 100);
    assert!(!ledger.batch(BatchId::new(0)).unwrap().retired);

    ledger.retire(&id("A"), 40, "offset", Timestamp::new(2_000)).unwrap();
    assert_eq!(ledger.balance_of(&id("A")), 60);
    assert_eq!(ledger.totals().total_retired, 40);
    let b0 = ledger.batch(BatchId::new(0)).unwrap();
    assert!(b0.retired);
    assert_eq!(b0.retirement_reason, "offset");

    ledger
        .mint(&owner(), MintRequest::new(id("B"), 50, "P2", "VER-P2"), Timestamp::new(3_000))
        .unwrap();
    assert!(!ledger.batch(BatchId::new(1)).unwrap().retired);
    assert_eq!(ledger.totals().total_minted, 150);

    let receipt = ledger.retire(&id("B"), 10, "commute", Timestamp::new(4_000)).unwrap();
    assert_eq!(receipt.retired_batch, Some(BatchId::new(1)));
    assert!(ledger.batch(BatchId::new(1)).unwrap().retired);
    assert_eq!(ledger.batch_count(), 2);
    assert_eq!(ledger.batch(BatchId::new(2)), Err(LedgerError::BatchNotFound(BatchId::new(2))));

    // 60 + 40 in circulation.
    assert_eq!(ledger.total_supply(), 100);
    ledger.verify_integrity().unwrap();
}

#[test]
fn non_verifier_mint_leaves_state_identical() {
    let mut ledger = CreditLedger::new(owner()).unwrap();
    ledger
        .mint(&owner(), MintRequest::new(id("A"), 10, "P1", "V1"), Timestamp::new(1))
        .unwrap();
    ledger.drain_events();
    let before = ledger.snapshot();

    let err = ledger
        .mint(&id("intruder"), MintRequest::new(id("intruder"), 1_000, "PX", "VX"), Timestamp::new(2))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized { .. }));

    let after = ledger.snapshot();
    assert_eq!(bincode::serialize(&before).unwrap(), bincode::serialize(&after).unwrap());
    assert!(ledger.drain_events().is_empty());
}

#[test]
fn pause_blocks_transfer_until_unpaused() {
    let mut ledger = CreditLedger::new(owner()).unwrap();
    ledger
        .mint(&owner(), MintRequest::new(id("A"), 5, "P1", "V1"), Timestamp::new(1))
        .unwrap();

    ledger.pause(&owner(), Timestamp::new(2)).unwrap();
    assert_eq!(ledger.transfer(&id("A"), &id("B"), 1, Timestamp::new(3)), Err(LedgerError::Halted));
    assert_eq!(
        ledger.mint(&owner(), MintRequest::new(id("A"), 1, "P2", "V2"), Timestamp::new(3)),
        Err(LedgerError::Halted)
    );
    assert_eq!(ledger.retire(&id("A"), 1, "offset", Timestamp::new(3)), Err(LedgerError::Halted));

    // Role management and queries still work.
    ledger.add_verifier(&owner(), &id("V"), Timestamp::new(4)).unwrap();
    assert_eq!(ledger.balance_of(&id("A")), 5);

    ledger.unpause(&owner(), Timestamp::new(5)).unwrap();
    let receipt = ledger.transfer(&id("A"), &id("B"), 1, Timestamp::new(6)).unwrap();
    assert_eq!(receipt.to_balance, 1);
}

#[test]
fn removed_verifier_loses_mint_rights() {
    let mut ledger = CreditLedger::new(owner()).unwrap();
    ledger.add_verifier(&owner(), &id("V"), Timestamp::new(1)).unwrap();
    ledger
        .mint(&id("V"), MintRequest::new(id("A"), 5, "P1", "V1"), Timestamp::new(2))
        .unwrap();
    ledger.remove_verifier(&owner(), &id("V"), Timestamp::new(3)).unwrap();
    assert!(matches!(
        ledger.mint(&id("V"), MintRequest::new(id("A"), 5, "P2", "V2"), Timestamp::new(4)),
        Err(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(ledger.batch_count(), 1);
}

#[test]
fn event_trail_is_ordered_and_gap_free() {
    let mut ledger = CreditLedger::new(owner()).unwrap();
    ledger.add_verifier(&owner(), &id("V"), Timestamp::new(1)).unwrap();
    ledger
        .mint(&id("V"), MintRequest::new(id("A"), 9, "P1", "V1"), Timestamp::new(2))
        .unwrap();
    let _ = ledger.retire(&id("A"), 10, "too much", Timestamp::new(3));
    ledger.transfer(&id("A"), &id("B"), 4, Timestamp::new(4)).unwrap();
    ledger.retire(&id("B"), 4, "offset", Timestamp::new(5)).unwrap();

    let events = ledger.drain_events();
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, [0, 1, 2, 3]);
    let last = events.last().unwrap();
    assert_eq!(last.totals.total_minted, 9);
    assert_eq!(last.totals.total_retired, 4);
}
