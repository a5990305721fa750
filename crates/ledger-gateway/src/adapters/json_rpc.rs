//! Ethereum JSON-RPC 2.0 client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::U256;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::{
    Address, BlockId, BlockNumber, BlockTag, Bytes, CallRequest, LedgerError, LedgerResult,
    LogFilter, Quantity, RpcBlock, RpcLog, RpcReceipt, TxHash,
};
use crate::ports::{LedgerConnector, LedgerRpc};

/// Transport-level failures, folded into [`LedgerError::Rpc`] at the port boundary.
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rpc(JsonRpcError),
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// Error object of a JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC Error {}: {}", self.code, self.message)
    }
}

/// Client timeouts
#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            connect: Duration::from_secs(5),
        }
    }
}

/// JSON-RPC client bound to one endpoint.
pub struct JsonRpcClient {
    client: Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>, timeouts: ClientTimeouts) -> Result<Self, RpcClientError> {
        let client = Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a method whose result may legitimately be `null`.
    async fn request_optional<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<R>, RpcClientError> {
        let id = self.next_id();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        trace!(method, id, "json-rpc request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RpcClientError::Connection(format!("Cannot connect to {}", self.endpoint))
                } else {
                    RpcClientError::Http(e)
                }
            })?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RpcClientError::Parse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            debug!(method, code = error.code, message = %error.message, "json-rpc error");
            return Err(RpcClientError::Rpc(error));
        }
        Ok(rpc_response.result)
    }

    async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<R> {
        match self.request_optional(method, params).await {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(LedgerError::rpc(method, "missing result in response")),
            Err(e) => Err(LedgerError::rpc(method, e)),
        }
    }
}

fn narrow(method: &str, value: Quantity) -> LedgerResult<u64> {
    value
        .to_u64()
        .ok_or_else(|| LedgerError::Decode(format!("{method} result exceeds u64")))
}

#[async_trait]
impl LedgerRpc for JsonRpcClient {
    async fn chain_id(&self) -> LedgerResult<u64> {
        let id: Quantity = self.request("eth_chainId", json!([])).await?;
        narrow("eth_chainId", id)
    }

    async fn block_number(&self) -> LedgerResult<BlockNumber> {
        let number: Quantity = self.request("eth_blockNumber", json!([])).await?;
        narrow("eth_blockNumber", number)
    }

    async fn get_balance(&self, address: Address) -> LedgerResult<U256> {
        let balance: Quantity = self
            .request("eth_getBalance", json!([address, BlockTag::Latest.as_str()]))
            .await?;
        Ok(balance.into_inner())
    }

    async fn call(&self, request: CallRequest) -> LedgerResult<Bytes> {
        self.request("eth_call", json!([request, BlockTag::Latest.as_str()]))
            .await
    }

    async fn transaction_count(&self, address: Address) -> LedgerResult<U256> {
        let nonce: Quantity = self
            .request(
                "eth_getTransactionCount",
                json!([address, BlockTag::Pending.as_str()]),
            )
            .await?;
        Ok(nonce.into_inner())
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        let price: Quantity = self.request("eth_gasPrice", json!([])).await?;
        Ok(price.into_inner())
    }

    async fn estimate_gas(&self, request: CallRequest) -> LedgerResult<U256> {
        let gas: Quantity = self.request("eth_estimateGas", json!([request])).await?;
        Ok(gas.into_inner())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        self.request("eth_sendRawTransaction", json!([raw])).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<RpcReceipt>> {
        self.request_optional("eth_getTransactionReceipt", json!([hash]))
            .await
            .map_err(|e| LedgerError::rpc("eth_getTransactionReceipt", e))
    }

    async fn block_by_number(&self, block: BlockId) -> LedgerResult<Option<RpcBlock>> {
        self.request_optional("eth_getBlockByNumber", json!([block, false]))
            .await
            .map_err(|e| LedgerError::rpc("eth_getBlockByNumber", e))
    }

    async fn logs(&self, filter: LogFilter) -> LedgerResult<Vec<RpcLog>> {
        self.request("eth_getLogs", json!([filter])).await
    }
}

/// Connector that opens [`JsonRpcClient`]s.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    timeouts: ClientTimeouts,
}

impl HttpConnector {
    pub fn new(timeouts: ClientTimeouts) -> Self {
        Self { timeouts }
    }
}

impl LedgerConnector for HttpConnector {
    fn connect(&self, endpoint: &str) -> LedgerResult<Arc<dyn LedgerRpc>> {
        let client = JsonRpcClient::new(endpoint, self.timeouts)
            .map_err(|e| LedgerError::rpc("connect", e))?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_getBalance",
            params: json!([Address::zero(), "latest"]),
            id: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(
            value["params"][0],
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_null_result_is_none() {
        let response: JsonRpcResponse<RpcReceipt> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(response.result.is_none());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_missing_result_field_is_none() {
        let response: JsonRpcResponse<RpcBlock> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#,
        )
        .unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn test_error_response() {
        let response: JsonRpcResponse<Quantity> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.to_string(), "RPC Error -32000: execution reverted");
    }

    #[test]
    fn test_log_filter_params() {
        let filter = LogFilter {
            from_block: BlockId::Number(5),
            to_block: BlockId::Tag(BlockTag::Latest),
            address: Address::repeat_byte(0x11),
            topics: vec![TxHash::repeat_byte(0x22)],
        };
        let value = json!([filter]);
        assert_eq!(value[0]["fromBlock"], "0x5");
        assert_eq!(value[0]["toBlock"], "latest");
        assert_eq!(value[0]["topics"][0], format!("0x{}", "22".repeat(32)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_rpc_error() {
        let timeouts = ClientTimeouts {
            request: Duration::from_millis(500),
            connect: Duration::from_millis(200),
        };
        let client = JsonRpcClient::new("http://127.0.0.1:1", timeouts).unwrap();
        let err = client.chain_id().await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { ref method, .. } if method == "eth_chainId"));
    }
}
