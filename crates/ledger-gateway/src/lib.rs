//! Ledger Gateway Core - signed access to the subsidy pool contract.
//!
//! Owns the single outbound ledger connection and exposes two services on top
//! of it. Transport layers (HTTP, CLI) stay thin: they validate input, call a
//! service and map [`ErrorCategory`] to their own status codes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   LEDGER GATEWAY CORE                    │
//! ├──────────────────────────────────────────────────────────┤
//! │  SubsidyService            ContractAdminService          │
//! │        │                          │                      │
//! │        └────────────┬─────────────┘                      │
//! │                     ▼                                    │
//! │             ConnectionManager                            │
//! │     (signer + contract binding + submitter)              │
//! │                     │                                    │
//! │          TransactionSubmitter (single writer)            │
//! │                     │                                    │
//! │              LedgerRpc port                              │
//! └─────────────────────┼────────────────────────────────────┘
//!                       ▼
//!        JSON-RPC over HTTP  |  in-memory ledger (tests)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ledger_gateway::{ConnectionManager, LedgerSettings, SubsidyService};
//!
//! let manager = Arc::new(ConnectionManager::http(settings.client_timeouts()));
//! manager.initialize(&settings);
//! let subsidies = SubsidyService::new(manager.clone());
//! let view = subsidies.get_pool_balance().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod connection;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use adapters::{ContractInterface, LocalSigner, SubsidyContract};
#[cfg(any(test, feature = "test-util"))]
pub use adapters::{InMemoryConnector, InMemoryLedger};
pub use connection::{
    ConnectionManager, ConnectionState, InitFailure, InitOutcome, LedgerConnection,
    LedgerSettings, Network,
};
pub use domain::{ErrorCategory, LedgerError, LedgerResult};
pub use service::{ContractAdminService, SubsidyService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
