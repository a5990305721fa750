//! `/api/contract` routes.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use ledger_gateway::domain::{
    ContractInfo, EventsPage, OwnerStatus, OwnerView, TransactionResult, TransactionStatus,
};

use super::{ok, ok_with, AppState, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::validation::{events_limit, validate_address, validate_transaction_hash, EventsQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/info", get(get_contract_info))
        .route("/owner", get(get_owner))
        .route("/is-owner/:address", get(check_owner_status))
        .route("/withdraw-remaining", post(withdraw_remaining))
        .route("/events", get(get_events))
        .route("/transaction/:tx_hash", get(get_transaction_status))
}

async fn get_contract_info(State(state): State<AppState>) -> ApiResult<Json<Envelope<ContractInfo>>> {
    let info = state
        .admin
        .get_contract_info()
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get contract information"))?;
    Ok(ok(info))
}

async fn get_owner(State(state): State<AppState>) -> ApiResult<Json<Envelope<OwnerView>>> {
    let owner = state
        .admin
        .get_owner()
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get contract owner"))?;
    Ok(ok(owner))
}

async fn check_owner_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Envelope<OwnerStatus>>> {
    validate_address(&address)?;
    let status = state
        .admin
        .check_owner_status(&address)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to check owner status"))?;
    Ok(ok(status))
}

async fn withdraw_remaining(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<TransactionResult>>> {
    let result = state
        .admin
        .withdraw_remaining_funds()
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to withdraw remaining funds"))?;
    Ok(ok_with("Remaining funds withdrawn successfully", result))
}

async fn get_events(
    State(state): State<AppState>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<Json<Envelope<EventsPage>>> {
    let Query(query) =
        query.map_err(|e| ApiError::bad_request("Invalid query", e.body_text()))?;
    let limit = events_limit(query.limit.as_deref(), state.max_events_limit)?;
    let page = state
        .admin
        .get_contract_events(query.from_block.as_deref(), query.to_block.as_deref(), limit)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get contract events"))?;
    Ok(ok(page))
}

async fn get_transaction_status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> ApiResult<Json<Envelope<TransactionStatus>>> {
    validate_transaction_hash(&tx_hash)?;
    let status = state
        .admin
        .get_transaction_status(&tx_hash)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get transaction status"))?;
    Ok(ok(status))
}
