//! Ledger gateway error types.
//!
//! Every failure surfaced by the core is a [`LedgerError`]. Transport layers
//! never match on messages; they map [`LedgerError::category`] to a status.

use super::address::AddressError;
use super::amount::AmountError;
use std::fmt;

/// Coarse failure classes used by the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad address, amount, hash or block bound
    InvalidInput,
    /// Signer is not the contract owner
    Unauthorized,
    /// Nothing to withdraw
    NoFundsAvailable,
    /// Receipt lookup found nothing
    TransactionNotFound,
    /// Connection manager is not ready
    ConnectionNotReady,
    /// The ledger rejected, reverted or failed the call
    LedgerRpcFailure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::Unauthorized => "Unauthorized",
            ErrorCategory::NoFundsAvailable => "NoFundsAvailable",
            ErrorCategory::TransactionNotFound => "TransactionNotFound",
            ErrorCategory::ConnectionNotReady => "ConnectionNotReady",
            ErrorCategory::LedgerRpcFailure => "LedgerRpcFailure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which balance turned out to be empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundsKind {
    /// A participant's subsidy balance
    Subsidy,
    /// The contract's native balance
    Contract,
}

impl fmt::Display for FundsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundsKind::Subsidy => f.write_str("No subsidy balance to withdraw"),
            FundsKind::Contract => f.write_str("Contract has no remaining funds"),
        }
    }
}

/// Errors produced by the ledger gateway core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Blockchain connection not available")]
    ConnectionNotReady,

    #[error("{0}")]
    InvalidAmount(#[from] AmountError),

    #[error("Invalid address: {input} ({reason})")]
    InvalidAddress { input: String, reason: AddressError },

    #[error("Invalid transaction hash: {input} ({reason})")]
    InvalidTransactionHash { input: String, reason: AddressError },

    #[error("Invalid block number or tag: {0}")]
    InvalidBlockTag(String),

    #[error("Only contract owner can {action}")]
    Unauthorized {
        signer: String,
        owner: String,
        action: &'static str,
    },

    #[error("{kind}")]
    NoFundsAvailable { holder: String, kind: FundsKind },

    #[error("Transaction hash not found on the blockchain")]
    TransactionNotFound { hash: String },

    #[error("Transaction reverted: {hash}")]
    TransactionReverted { hash: String },

    #[error("Ledger call {method} failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Failed to decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::ConnectionNotReady => ErrorCategory::ConnectionNotReady,
            LedgerError::InvalidAmount(_)
            | LedgerError::InvalidAddress { .. }
            | LedgerError::InvalidTransactionHash { .. }
            | LedgerError::InvalidBlockTag(_) => ErrorCategory::InvalidInput,
            LedgerError::Unauthorized { .. } => ErrorCategory::Unauthorized,
            LedgerError::NoFundsAvailable { .. } => ErrorCategory::NoFundsAvailable,
            LedgerError::TransactionNotFound { .. } => ErrorCategory::TransactionNotFound,
            LedgerError::TransactionReverted { .. }
            | LedgerError::Rpc { .. }
            | LedgerError::Decode(_) => ErrorCategory::LedgerRpcFailure,
        }
    }

    pub fn rpc(method: impl Into<String>, message: impl fmt::Display) -> Self {
        LedgerError::Rpc {
            method: method.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_address(input: &str, reason: AddressError) -> Self {
        LedgerError::InvalidAddress {
            input: input.to_string(),
            reason,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
