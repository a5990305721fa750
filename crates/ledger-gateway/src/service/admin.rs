//! Contract Admin Service: contract metadata, ownership, remaining-fund
//! withdrawal, event history and receipt lookups.

use std::sync::Arc;

use primitive_types::U256;
use tracing::{info, instrument};

use super::events::{self, EventQuery, DEFAULT_EVENTS_LIMIT};
use super::subsidy::{ensure_owner, submit, transaction_result};
use crate::connection::ConnectionManager;
use crate::domain::{
    format_hash, parse_address, parse_tx_hash, to_checksum, to_decimal, to_gwei, BlockId,
    ContractInfo, EventsPage, FundsKind, LedgerError, LedgerResult, OwnerStatus, OwnerView,
    TransactionResult, TransactionStatus, TxOutcome,
};

#[derive(Debug, Clone)]
pub struct ContractAdminService {
    connections: Arc<ConnectionManager>,
}

impl ContractAdminService {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Owner, pool total, contract balance and network.
    ///
    /// The three reads are issued together and are not taken at a single
    /// block, so the result is a point-in-time approximation.
    #[instrument(skip(self))]
    pub async fn get_contract_info(&self) -> LedgerResult<ContractInfo> {
        let connection = self.connections.require()?;
        let contract = connection.contract();

        let (owner, pool, balance) = tokio::try_join!(
            contract.owner(),
            contract.total_subsidy_pool(),
            contract.native_balance()
        )?;

        Ok(ContractInfo {
            contract_address: to_checksum(&contract.address()),
            owner: to_checksum(&owner),
            total_subsidy_pool: to_decimal(pool),
            total_subsidy_pool_wei: pool.to_string(),
            contract_balance: to_decimal(balance),
            contract_balance_wei: balance.to_string(),
            network: connection.network().to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_owner(&self) -> LedgerResult<OwnerView> {
        let connection = self.connections.require()?;
        let owner = connection.contract().owner().await?;
        Ok(OwnerView {
            owner: to_checksum(&owner),
        })
    }

    /// Whether `address` owns the contract, regardless of letter case.
    #[instrument(skip(self))]
    pub async fn check_owner_status(&self, address: &str) -> LedgerResult<OwnerStatus> {
        let connection = self.connections.require()?;
        let candidate =
            parse_address(address).map_err(|e| LedgerError::invalid_address(address, e))?;
        let owner = connection.contract().owner().await?;
        Ok(OwnerStatus {
            address: address.to_string(),
            is_owner: candidate == owner,
            owner: to_checksum(&owner),
        })
    }

    /// Drain the contract's native balance to the owner. Owner only.
    #[instrument(skip(self))]
    pub async fn withdraw_remaining_funds(&self) -> LedgerResult<TransactionResult> {
        let connection = self.connections.require()?;
        ensure_owner(&connection, "withdraw remaining funds").await?;

        let contract = connection.contract();
        let balance = contract.native_balance().await?;
        if balance.is_zero() {
            return Err(LedgerError::NoFundsAvailable {
                holder: to_checksum(&contract.address()),
                kind: FundsKind::Contract,
            });
        }

        let data = contract.encode("withdrawRemaining", &[])?;
        let receipt = submit(&connection, data, U256::zero()).await?;
        info!(
            amount_wei = %balance,
            hash = %format_hash(&receipt.transaction_hash),
            "remaining funds withdrawn"
        );

        Ok(transaction_result(balance, &receipt))
    }

    /// Most recent contract events in a block range.
    ///
    /// Bounds accept a height or a tag and default to `latest`.
    #[instrument(skip(self))]
    pub async fn get_contract_events(
        &self,
        from_block: Option<&str>,
        to_block: Option<&str>,
        limit: Option<usize>,
    ) -> LedgerResult<EventsPage> {
        let connection = self.connections.require()?;
        let query = EventQuery {
            from_block: parse_block(from_block)?,
            to_block: parse_block(to_block)?,
            limit: limit.unwrap_or(DEFAULT_EVENTS_LIMIT),
        };
        events::aggregate(connection.contract(), query).await
    }

    /// Receipt summary for any transaction hash.
    #[instrument(skip(self))]
    pub async fn get_transaction_status(&self, hash: &str) -> LedgerResult<TransactionStatus> {
        let connection = self.connections.require()?;
        let tx_hash = parse_tx_hash(hash).map_err(|reason| LedgerError::InvalidTransactionHash {
            input: hash.to_string(),
            reason,
        })?;

        let rpc = connection.rpc();
        let receipt = rpc
            .transaction_receipt(tx_hash)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound {
                hash: format_hash(&tx_hash),
            })?;

        let block_number = receipt
            .block_number
            .to_u64()
            .ok_or_else(|| LedgerError::Decode("receipt block number exceeds u64".into()))?;
        let timestamp = rpc
            .block_by_number(BlockId::Number(block_number))
            .await?
            .and_then(|block| block.timestamp.to_u64());

        Ok(TransactionStatus {
            transaction_hash: format_hash(&receipt.transaction_hash),
            block_number,
            block_hash: format_hash(&receipt.block_hash),
            status: if receipt.succeeded() {
                TxOutcome::Success
            } else {
                TxOutcome::Failed
            },
            gas_used: receipt.gas_used.into_inner().to_string(),
            effective_gas_price: to_gwei(receipt.effective_gas_price.into_inner()),
            timestamp,
            from: to_checksum(&receipt.from),
            to: receipt.to.as_ref().map(to_checksum),
            contract_address: receipt.contract_address.as_ref().map(to_checksum),
        })
    }
}

fn parse_block(bound: Option<&str>) -> LedgerResult<BlockId> {
    match bound.map(str::trim).filter(|b| !b.is_empty()) {
        Some(text) => text
            .parse()
            .map_err(|_| LedgerError::InvalidBlockTag(text.to_string())),
        None => Ok(BlockId::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockTag;

    #[test]
    fn test_parse_block_bounds() {
        assert_eq!(parse_block(None).unwrap(), BlockId::Tag(BlockTag::Latest));
        assert_eq!(parse_block(Some("")).unwrap(), BlockId::Tag(BlockTag::Latest));
        assert_eq!(parse_block(Some("earliest")).unwrap(), BlockId::Tag(BlockTag::Earliest));
        assert_eq!(parse_block(Some("42")).unwrap(), BlockId::Number(42));
        assert_eq!(parse_block(Some("0x2a")).unwrap(), BlockId::Number(42));
        assert_eq!(
            parse_block(Some("soon")).unwrap_err(),
            LedgerError::InvalidBlockTag("soon".into())
        );
    }
}
