//! Subsidy API - HTTP/JSON surface over the ledger gateway core.
//!
//! Routes validate input, call [`ledger_gateway`] services and translate
//! failures through [`error::ApiError`]. The process keeps serving `/health`
//! when the ledger connection could not be initialized.
//!
//! # Routes
//!
//! - `GET  /health`, `GET /`
//! - `GET  /api/subsidy/balance/:address`, `POST /api/subsidy/add`,
//!   `POST /api/subsidy/withdraw`, `GET /api/subsidy/pool-balance`,
//!   `POST /api/subsidy/fund-pool`
//! - `GET  /api/contract/info`, `GET /api/contract/owner`,
//!   `GET /api/contract/is-owner/:address`, `POST /api/contract/withdraw-remaining`,
//!   `GET /api/contract/events`, `GET /api/contract/transaction/:tx_hash`

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod validation;

pub use config::{ApiConfig, CliArgs, ConfigError};
pub use error::{ApiError, ApiResult};
pub use logging::{init_logging, LogFormat};
pub use service::{build_router, ServiceError, SubsidyApiService};
