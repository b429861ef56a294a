//! Fundamental types for the carbon-credit ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! account identities, batch identifiers, timestamps and the clock abstraction.

pub mod account;
pub mod batch;
pub mod error;
pub mod time;

pub use account::AccountId;
pub use batch::BatchId;
pub use error::TypesError;
pub use time::{Clock, SystemClock, Timestamp};
