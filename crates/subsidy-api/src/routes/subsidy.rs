//! `/api/subsidy` routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use ledger_gateway::domain::{BalanceView, PoolBalanceView, TransactionResult};

use super::{ok, ok_with, AppState, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::validation::{
    validate_add_subsidy, validate_address, validate_fund_pool, AddSubsidyRequest,
    FundPoolRequest,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance/:address", get(get_balance))
        .route("/add", post(add_subsidy))
        .route("/withdraw", post(withdraw_subsidy))
        .route("/pool-balance", get(get_pool_balance))
        .route("/fund-pool", post(fund_pool))
}

async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Envelope<BalanceView>>> {
    validate_address(&address)?;
    let view = state
        .subsidies
        .get_balance(&address)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get subsidy balance"))?;
    Ok(ok(view))
}

async fn add_subsidy(
    State(state): State<AppState>,
    body: Result<Json<AddSubsidyRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<TransactionResult>>> {
    let Json(request) = body?;
    let (user, amount) = validate_add_subsidy(&request)?;
    let result = state
        .subsidies
        .add_subsidy(&user, &amount)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to add subsidy"))?;
    Ok(ok_with("Subsidy added successfully", result))
}

async fn withdraw_subsidy(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<TransactionResult>>> {
    let result = state
        .subsidies
        .withdraw_subsidy()
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to withdraw subsidy"))?;
    Ok(ok_with("Subsidy withdrawn successfully", result))
}

async fn get_pool_balance(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<PoolBalanceView>>> {
    let view = state
        .subsidies
        .get_pool_balance()
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to get pool balance"))?;
    Ok(ok(view))
}

async fn fund_pool(
    State(state): State<AppState>,
    body: Result<Json<FundPoolRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<TransactionResult>>> {
    let Json(request) = body?;
    let amount = validate_fund_pool(&request)?;
    let result = state
        .subsidies
        .fund_pool(&amount)
        .await
        .map_err(|e| ApiError::ledger(e, "Failed to fund pool"))?;
    Ok(ok_with("Pool funded successfully", result))
}
