//! HTTP/JSON API for the carbon ledger node.
//!
//! Provides endpoints for:
//! - Minting, retiring and transferring credits
//! - Allowances
//! - Verifier management and the pause switch
//! - Balance, batch, role and supply queries
//! - The committed audit trail
//! - Node status and Prometheus metrics

pub mod amount;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use server::{router, AppState, RpcServer};
