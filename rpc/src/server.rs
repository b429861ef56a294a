//! Axum-based RPC server.

use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use carbon_node::tracing_spans::rpc_span;
use carbon_node::{CarbonNode, NodeMetrics, ShutdownController};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::handlers;
use crate::RpcError;

/// Shared handler state. The node is the single writer, so every request
/// takes its lock for the duration of one operation.
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<Mutex<CarbonNode>>,
    pub metrics: Arc<NodeMetrics>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(node: CarbonNode) -> Self {
        let metrics = node.metrics();
        let metrics_enabled = node.config().enable_metrics;
        Self {
            node: Arc::new(Mutex::new(node)),
            metrics,
            metrics_enabled,
        }
    }
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mint", post(handlers::mint))
        .route("/retire", post(handlers::retire))
        .route("/transfer", post(handlers::transfer))
        .route("/approve", post(handlers::approve))
        .route("/transfer_from", post(handlers::transfer_from))
        .route("/verifiers/add", post(handlers::add_verifier))
        .route("/verifiers/remove", post(handlers::remove_verifier))
        .route("/pause", post(handlers::pause))
        .route("/unpause", post(handlers::unpause))
        .route("/balance/:account", get(handlers::balance))
        .route("/allowance/:owner/:spender", get(handlers::allowance))
        .route("/batches", get(handlers::list_batches))
        .route("/batches/:id", get(handlers::batch))
        .route("/roles/:account", get(handlers::role))
        .route("/supply", get(handlers::supply))
        .route("/events", get(handlers::events))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(trace_request))
        .with_state(state)
}

async fn trace_request(request: Request, next: Next) -> Response {
    let span = rpc_span(request.method().as_str(), request.uri().path());
    async move {
        let response = next.run(request).await;
        tracing::debug!(status = response.status().as_u16(), "request handled");
        response
    }
    .instrument(span)
    .await
}

pub struct RpcServer {
    addr: String,
    state: AppState,
}

impl RpcServer {
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    /// Bind and serve until `shutdown` fires, then drain in-flight requests.
    pub async fn start(self, shutdown: &ShutdownController) -> Result<(), RpcError> {
        let mut rx = shutdown.subscribe();
        let listener = TcpListener::bind(&self.addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "RPC server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        tracing::info!("RPC server stopped");
        Ok(())
    }
}
