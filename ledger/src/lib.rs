//! Carbon-credit issuance ledger.
//!
//! Credits are fungible units minted against verified project records. Every
//! mint appends one [`CreditBatch`] to an append-only registry carrying the
//! provenance metadata (project, verification, methodology, location,
//! vintage). Holders move credits with transfers and extinguish them with
//! retirements; a retirement stamps its reason on the oldest batch that is
//! not yet retired.
//!
//! The crate is a pure state machine: operations take the caller identity and
//! the current time as arguments, apply their delta atomically or not at all,
//! and queue an [`EventRecord`] for the audit trail. Persistence and transport
//! live in `carbon-node` and `carbon-rpc`.

pub mod access;
pub mod balances;
pub mod changes;
pub mod error;
pub mod event;
pub mod issuance;
pub mod ledger;
pub mod registry;
pub mod retirement;
pub mod snapshot;

pub use access::{AccessControl, Role};
pub use balances::{BalanceBook, SupplyTotals};
pub use changes::{LedgerDelta, LedgerHeader};
pub use error::{InvalidArgument, LedgerError};
pub use event::{EventRecord, LedgerEvent};
pub use issuance::{MintReceipt, MintRequest};
pub use ledger::{CreditLedger, TransferReceipt};
pub use registry::{BatchRegistry, CreditBatch};
pub use retirement::RetireReceipt;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
