//! Domain types for the ledger gateway.
//!
//! Wire types, the amount codec, address primitives, result records and errors.

pub mod address;
pub mod amount;
pub mod error;
pub mod records;
pub mod types;

pub use address::{format_hash, keccak256, parse_address, parse_tx_hash, to_checksum, AddressError};
pub use amount::{to_decimal, to_gwei, to_native, AmountError};
pub use error::{ErrorCategory, FundsKind, LedgerError, LedgerResult};
pub use records::*;
pub use types::*;
