//! Adapters implementing the outbound ports and the contract codec.

pub mod abi;
pub mod contract;
#[cfg(any(test, feature = "test-util"))]
pub mod in_memory;
pub mod json_rpc;
pub mod signer;

pub use abi::{AbiError, ContractInterface, DecodedLog, Token, SUBSIDY_POOL_ABI};
pub use contract::SubsidyContract;
#[cfg(any(test, feature = "test-util"))]
pub use in_memory::{InMemoryConnector, InMemoryLedger, IN_MEMORY_CHAIN_ID};
pub use json_rpc::{ClientTimeouts, HttpConnector, JsonRpcClient};
pub use signer::{LegacyTransaction, LocalSigner, SignedTransaction, SignerError};
