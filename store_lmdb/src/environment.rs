//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::byteorder::BigEndian;
use heed::types::{Bytes, Str, Unit, U64};
use heed::{Database, Env, EnvOpenOptions};

use crate::integrity::check_data_dir;
use crate::ledger::LmdbLedgerStore;
use crate::meta::LmdbMetaStore;
use crate::migration::ensure_schema;
use crate::LmdbError;

/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

pub(crate) const STATE_DB: &str = "state";
pub(crate) const BATCHES_DB: &str = "batches";
pub(crate) const BALANCES_DB: &str = "balances";
pub(crate) const ALLOWANCES_DB: &str = "allowances";
pub(crate) const VERIFIERS_DB: &str = "verifiers";
pub(crate) const EVENTS_DB: &str = "events";
pub(crate) const META_DB: &str = "meta";

const MAX_DBS: u32 = 8;

pub(crate) type EventsDb = Database<U64<BigEndian>, Bytes>;
pub(crate) type KeyedDb = Database<Str, Bytes>;
/// Keys are [`carbon_types::BatchId::to_be_bytes`], so cursor order is mint order.
pub(crate) type BatchesDb = Database<Bytes, Bytes>;
/// Keys are `owner NUL spender`. Account ids are printable ASCII, so the
/// separator cannot occur inside either part.
pub(crate) type AllowancesDb = Database<Bytes, Bytes>;
pub(crate) type VerifiersDb = Database<Str, Unit>;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) state_db: KeyedDb,
    pub(crate) batches_db: BatchesDb,
    pub(crate) balances_db: KeyedDb,
    pub(crate) allowances_db: AllowancesDb,
    pub(crate) verifiers_db: VerifiersDb,
    pub(crate) events_db: EventsDb,
    pub(crate) meta_db: KeyedDb,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, create any
    /// missing databases and check the schema version.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        check_data_dir(path).map_err(LmdbError::DataDir)?;
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path
        // and never mapped by another `Env` handle concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let state_db: KeyedDb = env.create_database(&mut wtxn, Some(STATE_DB))?;
        let batches_db: BatchesDb = env.create_database(&mut wtxn, Some(BATCHES_DB))?;
        let balances_db: KeyedDb = env.create_database(&mut wtxn, Some(BALANCES_DB))?;
        let allowances_db: AllowancesDb = env.create_database(&mut wtxn, Some(ALLOWANCES_DB))?;
        let verifiers_db: VerifiersDb = env.create_database(&mut wtxn, Some(VERIFIERS_DB))?;
        let events_db: EventsDb = env.create_database(&mut wtxn, Some(EVENTS_DB))?;
        let meta_db: KeyedDb = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            state_db,
            batches_db,
            balances_db,
            allowances_db,
            verifiers_db,
            events_db,
            meta_db,
        };
        ensure_schema(&environment.meta_store())?;
        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(environment)
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn ledger_store(&self) -> LmdbLedgerStore {
        LmdbLedgerStore {
            env: Arc::clone(&self.env),
            state_db: self.state_db,
            batches_db: self.batches_db,
            balances_db: self.balances_db,
            allowances_db: self.allowances_db,
            verifiers_db: self.verifiers_db,
            events_db: self.events_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
