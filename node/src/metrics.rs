//! Prometheus metrics for the carbon ledger node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use carbon_ledger::{CreditLedger, EventRecord, LedgerEvent};
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub mints: IntCounter,
    pub retirements: IntCounter,
    pub transfers: IntCounter,
    /// Rejected operations, labelled by error code.
    pub rejected: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub total_minted: IntGauge,
    pub total_retired: IntGauge,
    pub circulating: IntGauge,
    pub batch_count: IntGauge,
    /// 1 while the ledger is halted.
    pub halted: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let mints = register_int_counter_with_registry!(
            Opts::new("carbon_mints_total", "Credit batches minted"),
            registry
        )
        .expect("failed to register mints counter");

        let retirements = register_int_counter_with_registry!(
            Opts::new("carbon_retirements_total", "Retirement operations applied"),
            registry
        )
        .expect("failed to register retirements counter");

        let transfers = register_int_counter_with_registry!(
            Opts::new(
                "carbon_transfers_total",
                "Transfers applied, including allowance transfers"
            ),
            registry
        )
        .expect("failed to register transfers counter");

        let rejected = register_int_counter_vec_with_registry!(
            Opts::new("carbon_rejected_operations_total", "Operations rejected by the ledger"),
            &["code"],
            registry
        )
        .expect("failed to register rejected counter");

        let total_minted = register_int_gauge_with_registry!(
            Opts::new("carbon_total_minted", "Credits ever minted"),
            registry
        )
        .expect("failed to register total_minted gauge");

        let total_retired = register_int_gauge_with_registry!(
            Opts::new("carbon_total_retired", "Credits ever retired"),
            registry
        )
        .expect("failed to register total_retired gauge");

        let circulating = register_int_gauge_with_registry!(
            Opts::new("carbon_circulating_supply", "Minted minus retired credits"),
            registry
        )
        .expect("failed to register circulating gauge");

        let batch_count = register_int_gauge_with_registry!(
            Opts::new("carbon_batch_count", "Credit batches in the registry"),
            registry
        )
        .expect("failed to register batch_count gauge");

        let halted = register_int_gauge_with_registry!(
            Opts::new("carbon_halted", "1 while state-changing operations are paused"),
            registry
        )
        .expect("failed to register halted gauge");

        Self {
            registry,
            mints,
            retirements,
            transfers,
            rejected,
            total_minted,
            total_retired,
            circulating,
            batch_count,
            halted,
        }
    }

    /// Count one committed event.
    pub fn record(&self, record: &EventRecord) {
        match record.event {
            LedgerEvent::Minted { .. } => self.mints.inc(),
            LedgerEvent::Retired { .. } => self.retirements.inc(),
            LedgerEvent::Transferred { .. } => self.transfers.inc(),
            _ => {}
        }
    }

    pub fn record_rejection(&self, code: &str) {
        self.rejected.with_label_values(&[code]).inc();
    }

    /// Refresh every gauge from the ledger's current state.
    pub fn observe(&self, ledger: &CreditLedger) {
        let totals = ledger.totals();
        self.total_minted.set(gauge_value(totals.total_minted));
        self.total_retired.set(gauge_value(totals.total_retired));
        self.circulating.set(gauge_value(totals.circulating()));
        self.batch_count.set(gauge_value(ledger.batch_count() as u128));
        self.halted.set(i64::from(ledger.is_halted()));
    }

    /// Encode the registry in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// Gauges are i64; saturate rather than wrap for very large supplies.
fn gauge_value(v: u128) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_ledger::MintRequest;
    use carbon_types::{AccountId, Timestamp};

    #[test]
    fn gauges_follow_ledger_state() {
        let owner = AccountId::new("owner");
        let mut ledger = CreditLedger::new(owner.clone()).unwrap();
        ledger
            .mint(&owner, MintRequest::new(AccountId::new("a"), 50, "P", "V"), Timestamp::new(1))
            .unwrap();
        ledger.retire(&AccountId::new("a"), 20, "offset", Timestamp::new(2)).unwrap();
        ledger.pause(&owner, Timestamp::new(3)).unwrap();

        let metrics = NodeMetrics::new();
        for event in ledger.drain_events() {
            metrics.record(&event);
        }
        metrics.observe(&ledger);

        assert_eq!(metrics.mints.get(), 1);
        assert_eq!(metrics.retirements.get(), 1);
        assert_eq!(metrics.transfers.get(), 0);
        assert_eq!(metrics.total_minted.get(), 50);
        assert_eq!(metrics.circulating.get(), 30);
        assert_eq!(metrics.batch_count.get(), 1);
        assert_eq!(metrics.halted.get(), 1);
    }

    #[test]
    fn encode_includes_rejections() {
        let metrics = NodeMetrics::new();
        metrics.record_rejection("UNAUTHORIZED");
        let text = metrics.encode().unwrap();
        assert!(text.contains("carbon_rejected_operations_total{code=\"UNAUTHORIZED\"} 1"));
        assert!(text.contains("carbon_halted 0"));
    }

    #[test]
    fn huge_supply_saturates() {
        assert_eq!(gauge_value(u128::MAX), i64::MAX);
        assert_eq!(gauge_value(7), 7);
    }
}
