//! Carbon-credit ledger node.
//!
//! The node is the single writer for one ledger. It:
//! - Loads the ledger from storage, or creates it for the configured owner
//! - Applies operations and commits each one with its audit events
//! - Publishes committed events to in-process subscribers
//! - Tracks Prometheus metrics
//! - Coordinates graceful shutdown

pub mod config;
pub mod error;
pub mod ledger_event;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{NodeConfig, StorageBackend};
pub use error::NodeError;
pub use ledger_event::EventBus;
pub use metrics::NodeMetrics;
pub use node::{CarbonNode, NodeStatus};
pub use shutdown::ShutdownController;
