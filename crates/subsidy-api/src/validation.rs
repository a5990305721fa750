//! Request validation performed before the core is called.

use ledger_gateway::domain::{parse_address, parse_tx_hash, to_native};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Body of `POST /api/subsidy/add`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubsidyRequest {
    pub user_address: Option<Value>,
    pub amount: Option<Value>,
}

/// Body of `POST /api/subsidy/fund-pool`
#[derive(Debug, Default, Deserialize)]
pub struct FundPoolRequest {
    pub amount: Option<Value>,
}

/// Query of `GET /api/contract/events`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub from_block: Option<String>,
    pub to_block: Option<String>,
    pub limit: Option<String>,
}

/// Validated `(userAddress, amount)` of an add request.
pub fn validate_add_subsidy(request: &AddSubsidyRequest) -> ApiResult<(String, String)> {
    let (Some(user), Some(amount)) = (present(&request.user_address), present(&request.amount))
    else {
        return Err(ApiError::bad_request(
            "Missing required fields",
            "userAddress and amount are required",
        ));
    };

    let user = user.as_str().ok_or_else(ApiError::invalid_address)?;
    validate_address(user)?;
    let amount = validate_amount(amount)?;
    Ok((user.to_string(), amount))
}

/// Validated amount of a fund-pool request.
pub fn validate_fund_pool(request: &FundPoolRequest) -> ApiResult<String> {
    let amount = present(&request.amount)
        .ok_or_else(|| ApiError::bad_request("Missing required field", "amount is required"))?;
    validate_amount(amount)
}

pub fn validate_address(address: &str) -> ApiResult<()> {
    parse_address(address)
        .map(|_| ())
        .map_err(|_| ApiError::invalid_address())
}

pub fn validate_transaction_hash(hash: &str) -> ApiResult<()> {
    parse_tx_hash(hash)
        .map(|_| ())
        .map_err(|_| ApiError::invalid_transaction_hash())
}

/// Amount as decimal text; JSON strings and numbers are accepted.
pub fn validate_amount(amount: &Value) -> ApiResult<String> {
    let text = match amount {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ApiError::invalid_amount()),
    };
    to_native(&text).map_err(|_| ApiError::invalid_amount())?;
    Ok(text)
}

/// Events page size: default 10, capped at `max`.
pub fn events_limit(limit: Option<&str>, max: usize) -> ApiResult<Option<usize>> {
    match limit.map(str::trim).filter(|l| !l.is_empty()) {
        None => Ok(None),
        Some(text) => text
            .parse::<usize>()
            .map(|n| Some(n.min(max)))
            .map_err(|_| ApiError::bad_request("Invalid limit", "limit must be a non-negative integer")),
    }
}

// Absent, null, false, 0 and "" all count as missing.
fn present(value: &Option<Value>) -> Option<&Value> {
    match value.as_ref()? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other),
    }
}
