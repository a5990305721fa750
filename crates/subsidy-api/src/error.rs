//! HTTP error responses.
//!
//! Every failure leaves the API as `{ "error": <title>, "message": <detail> }`
//! with a status picked from the ledger error category.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_gateway::domain::FundsKind;
use ledger_gateway::{ErrorCategory, LedgerError};
use serde::Serialize;

pub const INVALID_ADDRESS_MESSAGE: &str = "Please provide a valid Ethereum address";
pub const INVALID_AMOUNT_MESSAGE: &str = "Amount must be a positive number";
pub const INVALID_HASH_MESSAGE: &str = "Please provide a valid transaction hash";

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An error ready to be rendered as a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                message: message.into(),
            },
        }
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    pub fn invalid_address() -> Self {
        Self::bad_request("Invalid address", INVALID_ADDRESS_MESSAGE)
    }

    pub fn invalid_amount() -> Self {
        Self::bad_request("Invalid amount", INVALID_AMOUNT_MESSAGE)
    }

    pub fn invalid_transaction_hash() -> Self {
        Self::bad_request("Invalid transaction hash", INVALID_HASH_MESSAGE)
    }

    pub fn not_found(uri: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "Endpoint not found",
            format!("The endpoint {uri} does not exist"),
        )
    }

    pub fn timeout(after_secs: u64) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            "Request timeout",
            format!("Request exceeded {after_secs}s timeout"),
        )
    }

    /// Map a core failure. `failure` titles ledger failures for the route.
    pub fn ledger(err: LedgerError, failure: &'static str) -> Self {
        let message = err.to_string();
        match err.category() {
            ErrorCategory::InvalidInput => match err {
                LedgerError::InvalidAmount(_) => Self::invalid_amount(),
                LedgerError::InvalidAddress { .. } => Self::invalid_address(),
                LedgerError::InvalidTransactionHash { .. } => Self::invalid_transaction_hash(),
                _ => Self::bad_request("Invalid block range", message),
            },
            ErrorCategory::Unauthorized => Self::new(StatusCode::FORBIDDEN, "Access denied", message),
            ErrorCategory::NoFundsAvailable => {
                let title = match err {
                    LedgerError::NoFundsAvailable {
                        kind: FundsKind::Subsidy,
                        ..
                    } => "No subsidy available",
                    _ => "No funds to withdraw",
                };
                Self::bad_request(title, message)
            }
            ErrorCategory::TransactionNotFound => {
                Self::new(StatusCode::NOT_FOUND, "Transaction not found", message)
            }
            ErrorCategory::ConnectionNotReady => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", message)
            }
            ErrorCategory::LedgerRpcFailure => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, failure, message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid request body", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
