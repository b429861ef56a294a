//! The carbon ledger node.
//!
//! Owns the in-memory [`CreditLedger`] and a [`LedgerStore`]. Every accepted
//! operation is committed (the rows it changed plus its events) before it
//! becomes visible; a failed commit reverts exactly those rows.

use std::sync::Arc;

use carbon_ledger::{
    CreditLedger, EventRecord, LedgerError, MintReceipt, MintRequest, RetireReceipt,
    TransferReceipt,
};
use carbon_nullables::NullStore;
use carbon_store::LedgerStore;
use carbon_store_lmdb::{check_integrity, LmdbEnvironment};
use carbon_types::{AccountId, Clock, SystemClock, Timestamp};
use serde::Serialize;

use crate::config::{NodeConfig, StorageBackend};
use crate::ledger_event::EventBus;
use crate::metrics::NodeMetrics;
use crate::tracing_spans::operation_span;
use crate::NodeError;

/// Point-in-time summary for `/status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub owner: AccountId,
    pub halted: bool,
    pub batch_count: u64,
    pub event_count: u64,
    pub holder_count: usize,
    pub uptime_secs: u64,
}

pub struct CarbonNode {
    config: NodeConfig,
    ledger: CreditLedger,
    store: Box<dyn LedgerStore + Send + Sync>,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    metrics: Arc<NodeMetrics>,
    started_at: Timestamp,
}

impl CarbonNode {
    /// Open the configured storage backend and load or create the ledger.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let store: Box<dyn LedgerStore + Send + Sync> = match config.storage {
            StorageBackend::Lmdb => {
                let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)?;
                let report = check_integrity(&env)?;
                if !report.is_healthy() {
                    return Err(NodeError::Corrupted(report.errors.join("; ")));
                }
                tracing::info!(
                    databases = report.databases_checked,
                    entries = report.total_entries,
                    "storage integrity check passed"
                );
                Box::new(env.ledger_store())
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; ledger state will not survive restart");
                Box::new(NullStore::new())
            }
        };
        Self::with_store(config, store, Arc::new(SystemClock))
    }

    /// Build a node over an explicit store and clock.
    ///
    /// Loads the last committed snapshot (re-validating every invariant) or,
    /// for an empty store, creates a ledger owned by `config.owner` and
    /// commits it immediately.
    pub fn with_store(
        config: NodeConfig,
        store: Box<dyn LedgerStore + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let ledger = match store.load_snapshot()? {
            Some(snapshot) => {
                let ledger = CreditLedger::from_snapshot(snapshot)?;
                let stored_events = store.event_count()?;
                if stored_events != ledger.next_event_sequence() {
                    return Err(NodeError::Corrupted(format!(
                        "snapshot expects {} events, store holds {stored_events}",
                        ledger.next_event_sequence()
                    )));
                }
                if let Some(owner) = config.owner.as_ref().filter(|o| *o != ledger.owner()) {
                    tracing::warn!(
                        configured = %owner,
                        stored = %ledger.owner(),
                        "configured owner differs from stored ledger; keeping stored owner"
                    );
                }
                tracing::info!(
                    owner = %ledger.owner(),
                    batches = ledger.batch_count(),
                    events = stored_events,
                    halted = ledger.is_halted(),
                    "loaded ledger"
                );
                ledger
            }
            None => {
                let owner = config.owner.clone().ok_or(NodeError::MissingOwner)?;
                let mut ledger = CreditLedger::new(owner)?;
                store.commit(&ledger.take_changes(), &[])?;
                tracing::info!(owner = %ledger.owner(), "created new ledger");
                ledger
            }
        };

        let metrics = Arc::new(NodeMetrics::new());
        metrics.observe(&ledger);
        let started_at = clock.now();

        Ok(Self {
            config,
            ledger,
            store,
            clock,
            bus: EventBus::new(),
            metrics,
            started_at,
        })
    }

    // ── Operations ──────────────────────────────────────────────────────

    pub fn mint(&mut self, caller: &AccountId, request: MintRequest) -> Result<MintReceipt, NodeError> {
        self.apply("mint", caller, |ledger, caller, now| ledger.mint(caller, request, now))
    }

    pub fn retire(
        &mut self,
        caller: &AccountId,
        amount: u128,
        reason: &str,
    ) -> Result<RetireReceipt, NodeError> {
        self.apply("retire", caller, |ledger, caller, now| {
            ledger.retire(caller, amount, reason, now)
        })
    }

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<TransferReceipt, NodeError> {
        self.apply("transfer", caller, |ledger, caller, now| {
            ledger.transfer(caller, to, amount, now)
        })
    }

    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), NodeError> {
        self.apply("approve", caller, |ledger, caller, now| {
            ledger.approve(caller, spender, amount, now)
        })
    }

    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<TransferReceipt, NodeError> {
        self.apply("transfer_from", caller, |ledger, caller, now| {
            ledger.transfer_from(caller, from, to, amount, now)
        })
    }

    pub fn add_verifier(&mut self, caller: &AccountId, who: &AccountId) -> Result<(), NodeError> {
        self.apply("add_verifier", caller, |ledger, caller, now| {
            ledger.add_verifier(caller, who, now)
        })
    }

    pub fn remove_verifier(&mut self, caller: &AccountId, who: &AccountId) -> Result<(), NodeError> {
        self.apply("remove_verifier", caller, |ledger, caller, now| {
            ledger.remove_verifier(caller, who, now)
        })
    }

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), NodeError> {
        self.apply("pause", caller, |ledger, caller, now| ledger.pause(caller, now))
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), NodeError> {
        self.apply("unpause", caller, |ledger, caller, now| ledger.unpause(caller, now))
    }

    /// Run one ledger operation, then commit it together with its events.
    fn apply<T>(
        &mut self,
        op: &'static str,
        caller: &AccountId,
        f: impl FnOnce(&mut CreditLedger, &AccountId, Timestamp) -> Result<T, LedgerError>,
    ) -> Result<T, NodeError> {
        let _span = operation_span(op, caller.as_str()).entered();
        let now = self.clock.now();

        let out = match f(&mut self.ledger, caller, now) {
            Ok(out) => out,
            Err(e) => {
                self.metrics.record_rejection(e.kind());
                tracing::warn!(code = e.kind(), error = %e, "operation rejected");
                return Err(e.into());
            }
        };

        let events = self.ledger.drain_events();
        let delta = self.ledger.pending_changes();
        if let Err(e) = self.store.commit(&delta, &events) {
            self.ledger.revert_changes();
            tracing::error!(error = %e, "commit failed; ledger rolled back");
            return Err(e.into());
        }
        self.ledger.settle_changes();

        for event in &events {
            self.metrics.record(event);
            self.bus.emit(event);
        }
        self.metrics.observe(&self.ledger);
        Ok(out)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Read-only view of the committed ledger.
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Committed audit-trail entries with sequence >= `offset`.
    pub fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, NodeError> {
        Ok(self.store.events(offset, limit)?)
    }

    pub fn event_count(&self) -> Result<u64, NodeError> {
        Ok(self.store.event_count()?)
    }

    pub fn status(&self) -> Result<NodeStatus, NodeError> {
        Ok(NodeStatus {
            owner: self.ledger.owner().clone(),
            halted: self.ledger.is_halted(),
            batch_count: self.ledger.batch_count(),
            event_count: self.store.event_count()?,
            holder_count: self.ledger.holder_count(),
            uptime_secs: self.started_at.elapsed_since(self.clock.now()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Register a listener for committed events.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&EventRecord) + Send + Sync>) {
        self.bus.subscribe(listener);
    }
}
