//! Schema version stamp.
//!
//! The row layout (state, batches, balances, allowances, verifiers, events,
//! meta) is schema 1. A fresh environment is stamped on first open; one
//! written by a newer release is refused rather than misread.

use carbon_store::MetaStore;

use crate::LmdbError;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Stamp a fresh environment or confirm the stored version is readable.
pub fn ensure_schema(meta: &impl MetaStore) -> Result<(), LmdbError> {
    match meta.get_schema_version()? {
        0 => {
            meta.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            tracing::info!(version = CURRENT_SCHEMA_VERSION, "stamped fresh ledger schema");
            Ok(())
        }
        CURRENT_SCHEMA_VERSION => {
            tracing::debug!(version = CURRENT_SCHEMA_VERSION, "ledger schema is current");
            Ok(())
        }
        found => Err(LmdbError::SchemaTooNew {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        }),
    }
}
