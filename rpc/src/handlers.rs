//! RPC request handlers and their wire types.
//!
//! State-changing requests carry the acting identity as `caller`; amounts
//! go out as decimal strings.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use carbon_ledger::{
    CreditBatch, EventRecord, MintReceipt, MintRequest, RetireReceipt, Role, TransferReceipt,
};
use carbon_types::{AccountId, BatchId, Timestamp};
use carbon_utils::format_duration;
use serde::{Deserialize, Serialize};

use crate::pagination::{next_cursor, PaginationMeta, PaginationParams};
use crate::server::AppState;
use crate::RpcError;

type RpcResult<T> = Result<Json<T>, RpcError>;

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MintBody {
    pub caller: AccountId,
    pub to: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
    pub project_id: String,
    pub verification_id: String,
    #[serde(default)]
    pub methodology: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub vintage_year: u32,
}

#[derive(Debug, Deserialize)]
pub struct RetireBody {
    pub caller: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub caller: AccountId,
    pub to: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub caller: AccountId,
    pub spender: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct TransferFromBody {
    pub caller: AccountId,
    pub from: AccountId,
    pub to: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
}

#[derive(Debug, Deserialize)]
pub struct VerifierBody {
    pub caller: AccountId,
    pub account: AccountId,
}

#[derive(Debug, Deserialize)]
pub struct CallerBody {
    pub caller: AccountId,
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct MintResponse {
    pub batch_id: BatchId,
    #[serde(with = "crate::amount")]
    pub balance: u128,
}

impl From<MintReceipt> for MintResponse {
    fn from(r: MintReceipt) -> Self {
        Self {
            batch_id: r.batch_id,
            balance: r.balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetireResponse {
    #[serde(with = "crate::amount")]
    pub balance: u128,
    pub retired_batch: Option<BatchId>,
}

impl From<RetireReceipt> for RetireResponse {
    fn from(r: RetireReceipt) -> Self {
        Self {
            balance: r.balance,
            retired_batch: r.retired_batch,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferResponse {
    #[serde(with = "crate::amount")]
    pub from_balance: u128,
    #[serde(with = "crate::amount")]
    pub to_balance: u128,
}

impl From<TransferReceipt> for TransferResponse {
    fn from(r: TransferReceipt) -> Self {
        Self {
            from_balance: r.from_balance,
            to_balance: r.to_balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

const ACK: AckResponse = AckResponse { ok: true };

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: AccountId,
    #[serde(with = "crate::amount")]
    pub balance: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub owner: AccountId,
    pub spender: AccountId,
    #[serde(with = "crate::amount")]
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub id: BatchId,
    pub project_id: String,
    pub verification_id: String,
    pub verification_timestamp: Timestamp,
    pub methodology: String,
    pub location: String,
    pub vintage_year: u32,
    #[serde(with = "crate::amount")]
    pub amount: u128,
    pub recipient: AccountId,
    pub retired: bool,
    pub retirement_reason: String,
    pub retirement_timestamp: Timestamp,
}

impl BatchResponse {
    fn new(id: BatchId, batch: &CreditBatch) -> Self {
        Self {
            id,
            project_id: batch.project_id.clone(),
            verification_id: batch.verification_id.clone(),
            verification_timestamp: batch.verification_timestamp,
            methodology: batch.methodology.clone(),
            location: batch.location.clone(),
            vintage_year: batch.vintage_year,
            amount: batch.amount,
            recipient: batch.recipient.clone(),
            retired: batch.retired,
            retirement_reason: batch.retirement_reason.clone(),
            retirement_timestamp: batch.retirement_timestamp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchListResponse {
    pub batches: Vec<BatchResponse>,
    pub total: u64,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub account: AccountId,
    pub role: Role,
    pub can_mint: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupplyResponse {
    #[serde(with = "crate::amount")]
    pub total_minted: u128,
    #[serde(with = "crate::amount")]
    pub total_retired: u128,
    #[serde(with = "crate::amount")]
    pub total_supply: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventListResponse {
    pub events: Vec<EventRecord>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub owner: AccountId,
    pub halted: bool,
    pub batch_count: u64,
    pub event_count: u64,
    pub holder_count: usize,
    pub uptime_secs: u64,
    pub uptime: String,
}

// ── Mutations ────────────────────────────────────────────────────────────

pub async fn mint(
    State(state): State<AppState>,
    payload: Result<Json<MintBody>, JsonRejection>,
) -> RpcResult<MintResponse> {
    let Json(body) = payload?;
    let request = MintRequest::new(body.to, body.amount, body.project_id, body.verification_id)
        .methodology(body.methodology)
        .location(body.location)
        .vintage_year(body.vintage_year);
    let receipt = state.node.lock().await.mint(&body.caller, request)?;
    Ok(Json(receipt.into()))
}

pub async fn retire(
    State(state): State<AppState>,
    payload: Result<Json<RetireBody>, JsonRejection>,
) -> RpcResult<RetireResponse> {
    let Json(body) = payload?;
    let receipt = state
        .node
        .lock()
        .await
        .retire(&body.caller, body.amount, &body.reason)?;
    Ok(Json(receipt.into()))
}

pub async fn transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferBody>, JsonRejection>,
) -> RpcResult<TransferResponse> {
    let Json(body) = payload?;
    let receipt = state
        .node
        .lock()
        .await
        .transfer(&body.caller, &body.to, body.amount)?;
    Ok(Json(receipt.into()))
}

pub async fn approve(
    State(state): State<AppState>,
    payload: Result<Json<ApproveBody>, JsonRejection>,
) -> RpcResult<AckResponse> {
    let Json(body) = payload?;
    state
        .node
        .lock()
        .await
        .approve(&body.caller, &body.spender, body.amount)?;
    Ok(Json(ACK))
}

pub async fn transfer_from(
    State(state): State<AppState>,
    payload: Result<Json<TransferFromBody>, JsonRejection>,
) -> RpcResult<TransferResponse> {
    let Json(body) = payload?;
    let receipt =
        state
            .node
            .lock()
            .await
            .transfer_from(&body.caller, &body.from, &body.to, body.amount)?;
    Ok(Json(receipt.into()))
}

pub async fn add_verifier(
    State(state): State<AppState>,
    payload: Result<Json<VerifierBody>, JsonRejection>,
) -> RpcResult<AckResponse> {
    let Json(body) = payload?;
    state
        .node
        .lock()
        .await
        .add_verifier(&body.caller, &body.account)?;
    Ok(Json(ACK))
}

pub async fn remove_verifier(
    State(state): State<AppState>,
    payload: Result<Json<VerifierBody>, JsonRejection>,
) -> RpcResult<AckResponse> {
    let Json(body) = payload?;
    state
        .node
        .lock()
        .await
        .remove_verifier(&body.caller, &body.account)?;
    Ok(Json(ACK))
}

pub async fn pause(
    State(state): State<AppState>,
    payload: Result<Json<CallerBody>, JsonRejection>,
) -> RpcResult<AckResponse> {
    let Json(body) = payload?;
    state.node.lock().await.pause(&body.caller)?;
    Ok(Json(ACK))
}

pub async fn unpause(
    State(state): State<AppState>,
    payload: Result<Json<CallerBody>, JsonRejection>,
) -> RpcResult<AckResponse> {
    let Json(body) = payload?;
    state.node.lock().await.unpause(&body.caller)?;
    Ok(Json(ACK))
}

// ── Queries ──────────────────────────────────────────────────────────────

pub async fn balance(
    State(state): State<AppState>,
    Path(account): Path<AccountId>,
) -> RpcResult<BalanceResponse> {
    let balance = state.node.lock().await.ledger().balance_of(&account);
    Ok(Json(BalanceResponse { account, balance }))
}

pub async fn allowance(
    State(state): State<AppState>,
    Path((owner, spender)): Path<(AccountId, AccountId)>,
) -> RpcResult<AllowanceResponse> {
    let amount = state.node.lock().await.ledger().allowance(&owner, &spender);
    Ok(Json(AllowanceResponse {
        owner,
        spender,
        amount,
    }))
}

pub async fn batch(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> RpcResult<BatchResponse> {
    let Path(raw) = id?;
    let id: BatchId = raw
        .parse()
        .map_err(|e: carbon_types::TypesError| RpcError::InvalidRequest(e.to_string()))?;
    let node = state.node.lock().await;
    let batch = node.ledger().batch(id)?;
    Ok(Json(BatchResponse::new(id, batch)))
}

pub async fn list_batches(
    State(state): State<AppState>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> RpcResult<BatchListResponse> {
    let Query(params) = params?;
    let offset = params.offset()?;
    let count = params.effective_count();

    let node = state.node.lock().await;
    let ledger = node.ledger();
    let batches: Vec<BatchResponse> = ledger
        .batches(offset, count as usize)
        .into_iter()
        .map(|(id, b)| BatchResponse::new(id, b))
        .collect();
    let cursor = next_cursor(offset, batches.len(), count);
    Ok(Json(BatchListResponse {
        total: ledger.batch_count(),
        batches,
        pagination: PaginationMeta { cursor },
    }))
}

pub async fn role(
    State(state): State<AppState>,
    Path(account): Path<AccountId>,
) -> RpcResult<RoleResponse> {
    let role = state.node.lock().await.ledger().role_of(&account);
    Ok(Json(RoleResponse {
        account,
        can_mint: role.can_mint(),
        role,
    }))
}

pub async fn supply(State(state): State<AppState>) -> RpcResult<SupplyResponse> {
    let totals = state.node.lock().await.ledger().totals();
    Ok(Json(SupplyResponse {
        total_minted: totals.total_minted,
        total_retired: totals.total_retired,
        total_supply: totals.circulating(),
    }))
}

pub async fn events(
    State(state): State<AppState>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> RpcResult<EventListResponse> {
    let Query(params) = params?;
    let offset = params.offset()?;
    let count = params.effective_count();

    let events = state.node.lock().await.events(offset, count as usize)?;
    let cursor = next_cursor(offset, events.len(), count);
    Ok(Json(EventListResponse {
        events,
        pagination: PaginationMeta { cursor },
    }))
}

pub async fn status(State(state): State<AppState>) -> RpcResult<StatusResponse> {
    let status = state.node.lock().await.status()?;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        owner: status.owner,
        halted: status.halted,
        batch_count: status.batch_count,
        event_count: status.event_count,
        holder_count: status.holder_count,
        uptime: format_duration(status.uptime_secs),
        uptime_secs: status.uptime_secs,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, RpcError> {
    if !state.metrics_enabled {
        return Err(RpcError::NotFound("metrics are disabled".into()));
    }
    let body = state
        .metrics
        .encode()
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
