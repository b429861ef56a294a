//! Ledger state and audit-trail storage trait.

use carbon_ledger::{EventRecord, LedgerDelta, LedgerSnapshot};

use crate::StoreError;

/// Durable home for the ledger state and its event log.
///
/// State is kept as keyed rows (header, balances, allowances, verifiers,
/// batches) so a commit writes only what changed. Events are append-only and
/// keyed by their sequence number.
pub trait LedgerStore {
    /// Reassemble the committed state, or `None` for a fresh store.
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Apply `delta` and append `events` as one atomic unit.
    ///
    /// Implementations must reject an event whose sequence number is already
    /// stored with [`StoreError::Duplicate`], without writing anything.
    fn commit(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), StoreError>;

    /// Number of events stored.
    fn event_count(&self) -> Result<u64, StoreError>;

    /// Up to `limit` events with sequence >= `offset`, in order.
    fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError>;

    /// Fetch a single event by sequence number.
    fn event(&self, sequence: u64) -> Result<EventRecord, StoreError> {
        self.events(sequence, 1)?
            .into_iter()
            .next()
            .filter(|e| e.sequence == sequence)
            .ok_or_else(|| StoreError::NotFound(format!("event {sequence}")))
    }
}

impl<S: LedgerStore + ?Sized> LedgerStore for std::sync::Arc<S> {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        (**self).load_snapshot()
    }

    fn commit(&self, delta: &LedgerDelta, events: &[EventRecord]) -> Result<(), StoreError> {
        (**self).commit(delta, events)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        (**self).event_count()
    }

    fn events(&self, offset: u64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        (**self).events(offset, limit)
    }
}
