//! Deterministic in-process ledger.
//!
//! Simulates a single-node chain hosting the subsidy pool contract. Raw
//! transactions are decoded and their sender recovered from the signature, so
//! the signing path is exercised end to end. Every accepted transaction mines
//! one block.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use primitive_types::U256;
use tracing::debug;

use super::abi::{ContractInterface, Token};
use super::signer::{decode_signed_transaction, DecodedTransaction};
use crate::domain::{
    keccak256, Address, BlockId, BlockNumber, BlockTag, Bytes, CallRequest, EventKind,
    LedgerError, LedgerResult, LogFilter, Quantity, RpcBlock, RpcLog, RpcReceipt, TxHash,
};
use crate::ports::{LedgerConnector, LedgerRpc};

pub const IN_MEMORY_CHAIN_ID: u64 = 31337;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_TIME_SECS: u64 = 12;
const GAS_PRICE_WEI: u64 = 1_000_000_000;
const ESTIMATED_GAS: u64 = 60_000;

#[derive(Default)]
struct ChainState {
    height: BlockNumber,
    owner: Address,
    pool: U256,
    subsidies: HashMap<Address, U256>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    logs: Vec<RpcLog>,
    receipts: HashMap<TxHash, RpcReceipt>,
    submitted: Vec<TxHash>,
    mine_on_poll: bool,
    hide_blocks: bool,
}

impl ChainState {
    fn mine(&mut self) -> BlockNumber {
        self.height += 1;
        self.height
    }

    fn resolve(&self, block: BlockId) -> BlockNumber {
        match block {
            BlockId::Number(n) => n,
            BlockId::Tag(BlockTag::Earliest) => 0,
            BlockId::Tag(_) => self.height,
        }
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.balances.entry(from).or_default();
        *from_balance = from_balance.saturating_sub(amount);
        *self.balances.entry(to).or_default() += amount;
    }
}

fn block_hash(number: BlockNumber) -> TxHash {
    TxHash::from(keccak256(&number.to_be_bytes()))
}

/// In-memory [`LedgerRpc`] hosting one subsidy pool contract
pub struct InMemoryLedger {
    contract: Address,
    interface: ContractInterface,
    state: Mutex<ChainState>,
}

impl InMemoryLedger {
    pub fn new(contract: Address, owner: Address) -> Self {
        Self {
            contract,
            interface: ContractInterface::subsidy_pool(),
            state: Mutex::new(ChainState {
                owner,
                ..ChainState::default()
            }),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn set_owner(&self, owner: Address) {
        self.state.lock().owner = owner;
    }

    /// Allocate subsidy to `user`, backed by contract funds.
    pub fn credit_subsidy(&self, user: Address, amount: U256) {
        let mut state = self.state.lock();
        *state.subsidies.entry(user).or_default() += amount;
        *state.balances.entry(self.contract).or_default() += amount;
    }

    /// Add unallocated funds to the pool.
    pub fn seed_pool(&self, amount: U256) {
        let mut state = self.state.lock();
        state.pool += amount;
        *state.balances.entry(self.contract).or_default() += amount;
    }

    pub fn set_native_balance(&self, account: Address, amount: U256) {
        self.state.lock().balances.insert(account, amount);
    }

    pub fn subsidy_of(&self, user: Address) -> U256 {
        self.state.lock().subsidies.get(&user).copied().unwrap_or_default()
    }

    pub fn pool(&self) -> U256 {
        self.state.lock().pool
    }

    pub fn height(&self) -> BlockNumber {
        self.state.lock().height
    }

    /// Advance the chain by `count` empty blocks.
    pub fn mine_blocks(&self, count: u64) {
        self.state.lock().height += count;
    }

    /// Every `eth_blockNumber` call mines an empty block.
    pub fn set_mine_on_poll(&self, enabled: bool) {
        self.state.lock().mine_on_poll = enabled;
    }

    /// `eth_getBlockByNumber` returns null for every block.
    pub fn hide_blocks(&self, hidden: bool) {
        self.state.lock().hide_blocks = hidden;
    }

    /// Raw transactions accepted so far, reverted ones included.
    pub fn submitted(&self) -> Vec<TxHash> {
        self.state.lock().submitted.clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.state.lock().submitted.len()
    }

    /// Next nonce the ledger expects from `sender`.
    pub fn nonce_of(&self, sender: Address) -> u64 {
        self.state.lock().nonces.get(&sender).copied().unwrap_or_default()
    }

    /// Record a contract event at `block` without a transaction.
    pub fn push_event(&self, kind: EventKind, participant: Address, amount: U256, block: BlockNumber) {
        let Ok((topics, data)) = self
            .interface
            .encode_log(kind.name(), &[Token::Address(participant), Token::Uint(amount)])
        else {
            return;
        };
        let mut state = self.state.lock();
        if state.height < block {
            state.height = block;
        }
        let index = state.logs.len() as u64;
        state.logs.push(RpcLog {
            address: self.contract,
            topics,
            data: Bytes(data),
            block_number: Some(Quantity::from(block)),
            transaction_hash: Some(TxHash::from(keccak256(&index.to_be_bytes()))),
            log_index: Some(Quantity::from(index)),
        });
    }

    /// Store a receipt directly, e.g. a failed transaction from another sender.
    pub fn insert_receipt(&self, receipt: RpcReceipt) {
        let mut state = self.state.lock();
        let number = receipt.block_number.to_u64().unwrap_or_default();
        if state.height < number {
            state.height = number;
        }
        state.receipts.insert(receipt.transaction_hash, receipt);
    }

    fn view(&self, state: &ChainState, data: &[u8]) -> LedgerResult<Bytes> {
        let (function, args) = self
            .interface
            .decode_call(data)
            .map_err(|e| LedgerError::rpc("eth_call", format!("execution reverted: {e}")))?;
        let output = match (function.name.as_str(), args.as_slice()) {
            ("owner", []) => Token::Address(state.owner),
            ("totalSubsidyPool", []) => Token::Uint(state.pool),
            ("getSubsidy", [Token::Address(user)]) => {
                Token::Uint(state.subsidies.get(user).copied().unwrap_or_default())
            }
            (name, _) => {
                return Err(LedgerError::rpc(
                    "eth_call",
                    format!("execution reverted: {name} is not a view"),
                ))
            }
        };
        let mut word = vec![0u8; 32];
        match output {
            Token::Address(a) => word[12..].copy_from_slice(a.as_bytes()),
            Token::Uint(v) => v.to_big_endian(&mut word),
            _ => {}
        }
        Ok(Bytes(word))
    }

    /// Apply a contract call. `Err` is a revert reason; state is untouched on revert.
    fn execute(
        &self,
        state: &mut ChainState,
        decoded: &DecodedTransaction,
    ) -> Result<Vec<(EventKind, Address, U256)>, String> {
        let sender = decoded.sender;
        let value = decoded.tx.value;
        let (function, args) = self
            .interface
            .decode_call(&decoded.tx.data)
            .map_err(|e| e.to_string())?;
        if !value.is_zero() && function.name != "fundSubsidyPool" {
            return Err(format!("{} is not payable", function.name));
        }

        match (function.name.as_str(), args.as_slice()) {
            ("fundSubsidyPool", []) => {
                if value.is_zero() {
                    return Err("Must send ETH to fund pool".into());
                }
                state.pool += value;
                state.transfer(sender, self.contract, value);
                Ok(vec![(EventKind::SubsidyPoolFunded, sender, value)])
            }
            ("addSubsidy", [Token::Address(user), Token::Uint(amount)]) => {
                if sender != state.owner {
                    return Err("Only owner can call this function".into());
                }
                if *amount > state.pool {
                    return Err("Insufficient subsidy pool".into());
                }
                state.pool -= *amount;
                *state.subsidies.entry(*user).or_default() += *amount;
                Ok(vec![(EventKind::SubsidyAdded, *user, *amount)])
            }
            ("withdrawSubsidy", []) => {
                let amount = state.subsidies.get(&sender).copied().unwrap_or_default();
                if amount.is_zero() {
                    return Err("No subsidy available".into());
                }
                state.subsidies.insert(sender, U256::zero());
                state.transfer(self.contract, sender, amount);
                Ok(vec![(EventKind::SubsidyWithdrawn, sender, amount)])
            }
            ("withdrawRemaining", []) => {
                if sender != state.owner {
                    return Err("Only owner can call this function".into());
                }
                let balance = state.balances.get(&self.contract).copied().unwrap_or_default();
                if balance.is_zero() {
                    return Err("No funds to withdraw".into());
                }
                state.pool = U256::zero();
                state.transfer(self.contract, sender, balance);
                Ok(Vec::new())
            }
            (name, _) => Err(format!("{name} cannot be called in a transaction")),
        }
    }
}

#[async_trait]
impl LedgerRpc for InMemoryLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        Ok(IN_MEMORY_CHAIN_ID)
    }

    async fn block_number(&self) -> LedgerResult<BlockNumber> {
        let mut state = self.state.lock();
        if state.mine_on_poll {
            state.mine();
        }
        Ok(state.height)
    }

    async fn get_balance(&self, address: Address) -> LedgerResult<U256> {
        Ok(self.state.lock().balances.get(&address).copied().unwrap_or_default())
    }

    async fn call(&self, request: CallRequest) -> LedgerResult<Bytes> {
        if request.to != self.contract {
            return Ok(Bytes::default());
        }
        let state = self.state.lock();
        self.view(&state, request.data.as_slice())
    }

    async fn transaction_count(&self, address: Address) -> LedgerResult<U256> {
        Ok(U256::from(self.nonce_of(address)))
    }

    async fn gas_price(&self) -> LedgerResult<U256> {
        Ok(U256::from(GAS_PRICE_WEI))
    }

    async fn estimate_gas(&self, _request: CallRequest) -> LedgerResult<U256> {
        Ok(U256::from(ESTIMATED_GAS))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LedgerResult<TxHash> {
        const METHOD: &str = "eth_sendRawTransaction";
        let decoded =
            decode_signed_transaction(raw.as_slice()).map_err(|e| LedgerError::rpc(METHOD, e))?;
        if decoded.chain_id != Some(IN_MEMORY_CHAIN_ID) {
            return Err(LedgerError::rpc(METHOD, "invalid chain id"));
        }

        let mut state = self.state.lock();
        let expected = state.nonces.get(&decoded.sender).copied().unwrap_or_default();
        if decoded.tx.nonce != U256::from(expected) {
            return Err(LedgerError::rpc(
                METHOD,
                format!("nonce mismatch: expected {expected}, got {}", decoded.tx.nonce),
            ));
        }
        state.nonces.insert(decoded.sender, expected + 1);

        let outcome = match decoded.tx.to {
            Some(to) if to == self.contract => self.execute(&mut state, &decoded),
            Some(to) => {
                state.transfer(decoded.sender, to, decoded.tx.value);
                Ok(Vec::new())
            }
            None => Err("contract creation is not supported".to_string()),
        };

        let number = state.mine();
        let hash = decoded.hash;
        let mut logs = Vec::new();
        let succeeded = match outcome {
            Ok(events) => {
                for (kind, participant, amount) in events {
                    let (topics, data) = self
                        .interface
                        .encode_log(kind.name(), &[Token::Address(participant), Token::Uint(amount)])
                        .map_err(|e| LedgerError::rpc(METHOD, e))?;
                    let log = RpcLog {
                        address: self.contract,
                        topics,
                        data: Bytes(data),
                        block_number: Some(Quantity::from(number)),
                        transaction_hash: Some(hash),
                        log_index: Some(Quantity::from(state.logs.len() as u64)),
                    };
                    state.logs.push(log.clone());
                    logs.push(log);
                }
                true
            }
            Err(reason) => {
                debug!(hash = ?hash, %reason, "transaction reverted");
                false
            }
        };

        state.receipts.insert(
            hash,
            RpcReceipt {
                transaction_hash: hash,
                block_number: Quantity::from(number),
                block_hash: block_hash(number),
                status: Quantity::from(u64::from(succeeded)),
                gas_used: Quantity::from(ESTIMATED_GAS - 10_000),
                effective_gas_price: Quantity::from(GAS_PRICE_WEI),
                from: decoded.sender,
                to: decoded.tx.to,
                contract_address: None,
                logs,
            },
        );
        state.submitted.push(hash);
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<RpcReceipt>> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn block_by_number(&self, block: BlockId) -> LedgerResult<Option<RpcBlock>> {
        let state = self.state.lock();
        let number = state.resolve(block);
        if state.hide_blocks || number > state.height {
            return Ok(None);
        }
        Ok(Some(RpcBlock {
            number: Quantity::from(number),
            hash: block_hash(number),
            timestamp: Quantity::from(GENESIS_TIMESTAMP + number * BLOCK_TIME_SECS),
        }))
    }

    async fn logs(&self, filter: LogFilter) -> LedgerResult<Vec<RpcLog>> {
        let state = self.state.lock();
        let from = state.resolve(filter.from_block);
        let to = state.resolve(filter.to_block);
        let mut logs: Vec<RpcLog> = state
            .logs
            .iter()
            .filter(|log| log.address == filter.address)
            .filter(|log| match filter.topics.first() {
                Some(topic) => log.topics.first() == Some(topic),
                None => true,
            })
            .filter(|log| {
                let number = log.block_number.and_then(Quantity::to_u64).unwrap_or_default();
                from <= number && number <= to
            })
            .cloned()
            .collect();
        logs.sort_by_key(|log| log.block_number.and_then(Quantity::to_u64).unwrap_or_default());
        Ok(logs)
    }
}

/// Connector handing out one shared [`InMemoryLedger`] regardless of endpoint
#[derive(Clone)]
pub struct InMemoryConnector {
    ledger: Arc<InMemoryLedger>,
}

impl InMemoryConnector {
    pub fn new(ledger: Arc<InMemoryLedger>) -> Self {
        Self { ledger }
    }
}

impl LedgerConnector for InMemoryConnector {
    fn connect(&self, _endpoint: &str) -> LedgerResult<Arc<dyn LedgerRpc>> {
        Ok(self.ledger.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::signer::{LegacyTransaction, LocalSigner};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn setup() -> (InMemoryLedger, LocalSigner) {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        let ledger = InMemoryLedger::new(Address::repeat_byte(0xcc), signer.address());
        (ledger, signer)
    }

    fn tx(ledger: &InMemoryLedger, nonce: u64, data: Vec<u8>, value: U256) -> LegacyTransaction {
        LegacyTransaction {
            nonce: U256::from(nonce),
            gas_price: U256::from(GAS_PRICE_WEI),
            gas_limit: U256::from(ESTIMATED_GAS),
            to: Some(ledger.contract_address()),
            value,
            data,
            chain_id: IN_MEMORY_CHAIN_ID,
        }
    }

    #[tokio::test]
    async fn test_fund_pool_emits_event() {
        let (ledger, signer) = setup();
        let data = ledger.interface.encode_call("fundSubsidyPool", &[]).unwrap();
        let signed = signer.sign_legacy(&tx(&ledger, 0, data, U256::from(7u64))).unwrap();

        let hash = ledger.send_raw_transaction(Bytes(signed.raw)).await.unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(ledger.pool(), U256::from(7u64));
        assert_eq!(
            ledger.get_balance(ledger.contract_address()).await.unwrap(),
            U256::from(7u64)
        );
    }

    #[tokio::test]
    async fn test_non_owner_add_reverts() {
        let (ledger, signer) = setup();
        ledger.set_owner(Address::repeat_byte(0x01));
        ledger.seed_pool(U256::from(100u64));
        let data = ledger
            .interface
            .encode_call(
                "addSubsidy",
                &[Token::Address(Address::repeat_byte(0x02)), Token::Uint(U256::one())],
            )
            .unwrap();
        let signed = signer.sign_legacy(&tx(&ledger, 0, data, U256::zero())).unwrap();

        let hash = ledger.send_raw_transaction(Bytes(signed.raw)).await.unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(ledger.pool(), U256::from(100u64));
        // Reverted transactions still consume the nonce
        assert_eq!(ledger.nonce_of(signer.address()), 1);
    }

    #[tokio::test]
    async fn test_rejects_replayed_nonce() {
        let (ledger, signer) = setup();
        let data = ledger.interface.encode_call("fundSubsidyPool", &[]).unwrap();
        let signed = signer.sign_legacy(&tx(&ledger, 0, data, U256::one())).unwrap();
        ledger.send_raw_transaction(Bytes(signed.raw.clone())).await.unwrap();

        let err = ledger.send_raw_transaction(Bytes(signed.raw)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rpc { .. }));
        assert_eq!(ledger.submitted_count(), 1);
    }

    #[tokio::test]
    async fn test_call_to_unknown_address_is_empty() {
        let (ledger, _) = setup();
        let out = ledger
            .call(CallRequest {
                from: None,
                to: Address::zero(),
                value: None,
                data: Bytes(vec![0x8d, 0xa5, 0xcb, 0x5b]),
            })
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_logs_filter_by_range_and_topic() {
        let (ledger, _) = setup();
        let user = Address::repeat_byte(0x09);
        ledger.push_event(EventKind::SubsidyAdded, user, U256::one(), 3);
        ledger.push_event(EventKind::SubsidyAdded, user, U256::one(), 8);
        ledger.push_event(EventKind::SubsidyPoolFunded, user, U256::one(), 5);

        let topic = ledger.interface.event("SubsidyAdded").unwrap().topic;
        let logs = ledger
            .logs(LogFilter {
                from_block: BlockId::Number(0),
                to_block: BlockId::Number(5),
                address: ledger.contract_address(),
                topics: vec![topic],
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, Some(Quantity::from(3u64)));
    }
}
