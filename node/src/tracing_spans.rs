//! Span constructors shared by the node and the RPC layer, so operations
//! can be filtered by name and caller.

use tracing::{info_span, Span};

/// Span covering one ledger operation from validation to commit.
pub fn operation_span(op: &str, caller: &str) -> Span {
    info_span!("ledger_op", op = %op, caller = %caller)
}

/// Span covering a single HTTP request handled by the RPC server.
pub fn rpc_span(method: &str, path: &str) -> Span {
    info_span!("rpc", method = %method, path = %path)
}
