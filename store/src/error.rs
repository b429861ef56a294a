//! Errors shared by every storage backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No row or event under the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// An event sequence number was committed twice. The commit wrote nothing.
    #[error("already stored: {0}")]
    Duplicate(String),

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("cannot encode or decode stored value: {0}")]
    Serialization(String),

    /// Stored rows do not add up to a consistent ledger.
    #[error("stored ledger state is corrupted: {0}")]
    Corruption(String),
}
