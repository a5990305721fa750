//! Outbound ports for the ledger gateway.
//!
//! Everything the core needs from the ledger goes through [`LedgerRpc`].
//! Production uses the JSON-RPC adapter; tests use the in-memory ledger.

use crate::domain::{
    Address, BlockId, BlockNumber, Bytes, CallRequest, LedgerResult, LogFilter, RpcBlock,
    RpcLog, RpcReceipt, TxHash,
};
use async_trait::async_trait;
use primitive_types::U256;
use std::sync::Arc;

/// Ethereum JSON-RPC surface used by the gateway
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// eth_chainId
    async fn chain_id(&self) -> LedgerResult<u64>;

    /// eth_blockNumber
    async fn block_number(&self) -> LedgerResult<BlockNumber>;

    /// eth_getBalance at latest
    async fn get_balance(&self, address: Address) -> LedgerResult<U256>;

    /// eth_call at latest
    async fn call(&self, request: CallRequest) -> LedgerResult<Bytes>;

    /// eth_getTransactionCount at pending
    async fn transaction_count(&self, address: Address) -> LedgerResult<U256>;

    /// eth_gasPrice
    async fn gas_price(&self) -> LedgerResult<U256>;

    /// eth_estimateGas
    async fn estimate_gas(&self, request: CallRequest) -> LedgerResult<U256>;

    /// eth_sendRawTransaction
    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash>;

    /// eth_getTransactionReceipt; `None` while pending or unknown
    async fn transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<RpcReceipt>>;

    /// eth_getBlockByNumber without transaction bodies
    async fn block_by_number(&self, block: BlockId) -> LedgerResult<Option<RpcBlock>>;

    /// eth_getLogs
    async fn logs(&self, filter: LogFilter) -> LedgerResult<Vec<RpcLog>>;
}

/// Builds the RPC handle for a resolved endpoint.
///
/// Connection Manager depends on this seam so tests can hand it an in-memory ledger.
pub trait LedgerConnector: Send + Sync {
    fn connect(&self, endpoint: &str) -> LedgerResult<Arc<dyn LedgerRpc>>;
}
