//! Abstract storage traits for the carbon-credit ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The node depends only on the traits.

pub mod error;
pub mod ledger;
pub mod meta;

pub use error::StoreError;
pub use ledger::LedgerStore;
pub use meta::MetaStore;
