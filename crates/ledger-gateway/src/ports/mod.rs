//! Ports (hexagonal seams) of the ledger gateway.

pub mod outbound;

pub use outbound::{LedgerConnector, LedgerRpc};
