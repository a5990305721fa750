//! Liveness, service banner and fallback handlers.

use axum::{
    extract::{OriginalUri, State},
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use ledger_gateway::ConnectionState;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;

/// Liveness plus ledger connection state. Always 200.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let ledger_state = state.connections.state();
    let reason = match &ledger_state {
        ConnectionState::Failed(reason) => Some(reason.to_string()),
        _ => None,
    };
    Json(json!({
        "status": "OK",
        "message": "Subsidy Ledger Gateway API is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "ledger": {
            "ready": state.connections.is_ready(),
            "state": ledger_state.as_str(),
            "reason": reason,
        }
    }))
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the Subsidy Pool Smart Contract API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "subsidy": "/api/subsidy",
            "contract": "/api/contract"
        }
    }))
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(&uri.to_string())
}
