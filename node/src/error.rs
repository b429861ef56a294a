use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] carbon_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] carbon_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] carbon_store_lmdb::LmdbError),

    #[error("config error: {0}")]
    Config(String),

    #[error("no ledger found and no owner configured")]
    MissingOwner,

    #[error("stored state is inconsistent: {0}")]
    Corrupted(String),
}
