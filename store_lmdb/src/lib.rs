//! LMDB storage backend for the carbon-credit ledger.
//!
//! Implements the storage traits from `carbon-store` using the `heed` LMDB
//! bindings. Each logical store maps to one LMDB database within a single
//! environment; values are `bincode`-encoded.

pub mod environment;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod meta;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use ledger::LmdbLedgerStore;
pub use meta::LmdbMetaStore;
