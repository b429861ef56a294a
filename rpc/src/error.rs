//! RPC error type and its HTTP mapping.
//!
//! Every error renders as `{"error": {"code": ..., "message": ...}}`. The
//! code for ledger rejections is the ledger's own stable error code.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carbon_ledger::LedgerError;
use carbon_node::NodeError;
use carbon_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl RpcError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Ledger(e) => (ledger_status(e), e.kind()),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            Self::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) | Self::Server(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        LedgerError::InvalidArgument(_) | LedgerError::Overflow => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::InsufficientBalance { .. }
        | LedgerError::InsufficientAllowance { .. }
        | LedgerError::AlreadyInRole(_)
        | LedgerError::NotInRole(_)
        | LedgerError::NotHalted => StatusCode::CONFLICT,
        LedgerError::BatchNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Halted => StatusCode::LOCKED,
        LedgerError::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<NodeError> for RpcError {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::Ledger(e) => Self::Ledger(e),
            NodeError::Store(e) => Self::Store(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for RpcError {
    fn from(e: JsonRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl From<PathRejection> for RpcError {
    fn from(e: PathRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(e: QueryRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Server-side failures are logged, not echoed to clients.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbon_ledger::InvalidArgument;
    use carbon_types::{AccountId, BatchId};

    fn status(e: LedgerError) -> (StatusCode, &'static str) {
        RpcError::from(e).status_and_code()
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(
            status(LedgerError::Unauthorized {
                caller: AccountId::new("x"),
                action: "mint",
            }),
            (StatusCode::FORBIDDEN, "UNAUTHORIZED")
        );
        assert_eq!(
            status(InvalidArgument::ZeroAmount.into()),
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ARGUMENT")
        );
        assert_eq!(
            status(LedgerError::InsufficientBalance {
                needed: 2,
                available: 1
            }),
            (StatusCode::CONFLICT, "INSUFFICIENT_BALANCE")
        );
        assert_eq!(
            status(LedgerError::BatchNotFound(BatchId::new(9))),
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        );
        assert_eq!(status(LedgerError::Halted), (StatusCode::LOCKED, "HALTED"));
        assert_eq!(
            status(LedgerError::Overflow),
            (StatusCode::UNPROCESSABLE_ENTITY, "OVERFLOW")
        );
    }

    #[test]
    fn store_failures_are_internal() {
        let (code, name) =
            RpcError::from(NodeError::Store(StoreError::Backend("disk".into()))).status_and_code();
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(name, "STORE_ERROR");
    }
}
