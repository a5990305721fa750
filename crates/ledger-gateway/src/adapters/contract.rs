//! Binding of the subsidy pool contract to an RPC handle.

use std::sync::Arc;

use primitive_types::U256;
use tracing::trace;

use super::abi::{AbiError, ContractInterface, DecodedLog, Token};
use crate::domain::{
    Address, BlockId, Bytes, CallRequest, EventKind, LedgerError, LedgerResult, LogFilter,
    RpcLog,
};
use crate::ports::LedgerRpc;

impl From<AbiError> for LedgerError {
    fn from(e: AbiError) -> Self {
        LedgerError::Decode(e.to_string())
    }
}

/// Contract address, interface and transport used together for every call
#[derive(Clone)]
pub struct SubsidyContract {
    address: Address,
    interface: Arc<ContractInterface>,
    rpc: Arc<dyn LedgerRpc>,
}

impl SubsidyContract {
    pub fn new(address: Address, interface: Arc<ContractInterface>, rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            address,
            interface,
            rpc,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        &self.rpc
    }

    /// Call data for a state-changing function.
    pub fn encode(&self, function: &str, args: &[Token]) -> LedgerResult<Vec<u8>> {
        Ok(self.interface.encode_call(function, args)?)
    }

    async fn read(&self, function: &str, args: &[Token]) -> LedgerResult<Token> {
        let data = self.interface.encode_call(function, args)?;
        let output = self
            .rpc
            .call(CallRequest {
                from: None,
                to: self.address,
                value: None,
                data: Bytes(data),
            })
            .await?;
        trace!(function, bytes = output.len(), "contract read");

        self.interface
            .decode_output(function, output.as_slice())?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Decode(format!("{function} returned no value")))
    }

    pub async fn owner(&self) -> LedgerResult<Address> {
        self.read("owner", &[])
            .await?
            .into_address()
            .ok_or_else(|| LedgerError::Decode("owner() did not return an address".into()))
    }

    pub async fn total_subsidy_pool(&self) -> LedgerResult<U256> {
        self.read_uint("totalSubsidyPool", &[]).await
    }

    pub async fn get_subsidy(&self, user: Address) -> LedgerResult<U256> {
        self.read_uint("getSubsidy", &[Token::Address(user)]).await
    }

    /// Native balance held by the contract account.
    pub async fn native_balance(&self) -> LedgerResult<U256> {
        self.rpc.get_balance(self.address).await
    }

    async fn read_uint(&self, function: &str, args: &[Token]) -> LedgerResult<U256> {
        self.read(function, args)
            .await?
            .into_uint()
            .ok_or_else(|| LedgerError::Decode(format!("{function} did not return an integer")))
    }

    /// Raw logs of one event category in a block range.
    pub async fn event_logs(
        &self,
        kind: EventKind,
        from_block: BlockId,
        to_block: BlockId,
    ) -> LedgerResult<Vec<RpcLog>> {
        let topic = self.interface.event(kind.name())?.topic;
        self.rpc
            .logs(LogFilter {
                from_block,
                to_block,
                address: self.address,
                topics: vec![topic],
            })
            .await
    }

    pub fn decode_event(&self, kind: EventKind, log: &RpcLog) -> LedgerResult<DecodedLog> {
        Ok(self.interface.decode_log(kind.name(), log)?)
    }
}

impl std::fmt::Debug for SubsidyContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsidyContract")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
