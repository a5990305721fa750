//! Subsidy Ledger Service: participant balances, grants, withdrawals and pool funding.

use std::sync::Arc;

use primitive_types::U256;
use tracing::{info, instrument};

use crate::adapters::abi::Token;
use crate::connection::{ConnectionManager, LedgerConnection};
use crate::domain::{
    format_hash, parse_address, to_checksum, to_decimal, to_native, BalanceView, FundsKind,
    LedgerError, LedgerResult, PoolBalanceView, RpcReceipt, TransactionResult,
};

/// Operations on participant subsidies and the shared pool
#[derive(Debug, Clone)]
pub struct SubsidyService {
    connections: Arc<ConnectionManager>,
}

impl SubsidyService {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Current subsidy balance of `address`.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, address: &str) -> LedgerResult<BalanceView> {
        let connection = self.connections.require()?;
        let user = parse_address(address).map_err(|e| LedgerError::invalid_address(address, e))?;

        let balance = connection.contract().get_subsidy(user).await?;
        Ok(BalanceView {
            address: address.to_string(),
            balance: to_decimal(balance),
            balance_wei: balance.to_string(),
        })
    }

    /// Grant `amount` from the pool to `user_address`. Owner only.
    #[instrument(skip(self))]
    pub async fn add_subsidy(&self, user_address: &str, amount: &str) -> LedgerResult<TransactionResult> {
        let connection = self.connections.require()?;
        let user = parse_address(user_address)
            .map_err(|e| LedgerError::invalid_address(user_address, e))?;
        let amount_wei = to_native(amount)?;

        ensure_owner(&connection, "add subsidies").await?;

        let data = connection
            .contract()
            .encode("addSubsidy", &[Token::Address(user), Token::Uint(amount_wei)])?;
        let receipt = submit(&connection, data, U256::zero()).await?;
        info!(
            user = %to_checksum(&user),
            amount_wei = %amount_wei,
            hash = %format_hash(&receipt.transaction_hash),
            "subsidy added"
        );

        Ok(TransactionResult {
            user_address: Some(user_address.to_string()),
            ..transaction_result(amount_wei, &receipt)
        })
    }

    /// Withdraw the signer's whole subsidy balance.
    #[instrument(skip(self))]
    pub async fn withdraw_subsidy(&self) -> LedgerResult<TransactionResult> {
        let connection = self.connections.require()?;
        let signer = connection.signer_address();

        let balance = connection.contract().get_subsidy(signer).await?;
        if balance.is_zero() {
            return Err(LedgerError::NoFundsAvailable {
                holder: to_checksum(&signer),
                kind: FundsKind::Subsidy,
            });
        }

        let data = connection.contract().encode("withdrawSubsidy", &[])?;
        let receipt = submit(&connection, data, U256::zero()).await?;
        info!(
            amount_wei = %balance,
            hash = %format_hash(&receipt.transaction_hash),
            "subsidy withdrawn"
        );

        Ok(transaction_result(balance, &receipt))
    }

    /// Outstanding pool total.
    #[instrument(skip(self))]
    pub async fn get_pool_balance(&self) -> LedgerResult<PoolBalanceView> {
        let connection = self.connections.require()?;
        let pool = connection.contract().total_subsidy_pool().await?;
        Ok(PoolBalanceView {
            pool_balance: to_decimal(pool),
            pool_balance_wei: pool.to_string(),
        })
    }

    /// Send `amount` of native currency into the pool.
    #[instrument(skip(self))]
    pub async fn fund_pool(&self, amount: &str) -> LedgerResult<TransactionResult> {
        let connection = self.connections.require()?;
        let amount_wei = to_native(amount)?;

        let data = connection.contract().encode("fundSubsidyPool", &[])?;
        let receipt = submit(&connection, data, amount_wei).await?;
        info!(
            amount_wei = %amount_wei,
            hash = %format_hash(&receipt.transaction_hash),
            "subsidy pool funded"
        );

        Ok(transaction_result(amount_wei, &receipt))
    }
}

/// Fail with `Unauthorized` unless the signer owns the contract.
pub(crate) async fn ensure_owner(connection: &LedgerConnection, action: &'static str) -> LedgerResult<()> {
    let owner = connection.contract().owner().await?;
    let signer = connection.signer_address();
    if signer != owner {
        return Err(LedgerError::Unauthorized {
            signer: to_checksum(&signer),
            owner: to_checksum(&owner),
            action,
        });
    }
    Ok(())
}

pub(crate) async fn submit(
    connection: &LedgerConnection,
    data: Vec<u8>,
    value: U256,
) -> LedgerResult<RpcReceipt> {
    connection
        .submitter()
        .submit_and_confirm(connection.contract().address(), data, value)
        .await
}

pub(crate) fn transaction_result(amount_wei: U256, receipt: &RpcReceipt) -> TransactionResult {
    TransactionResult {
        user_address: None,
        amount: to_decimal(amount_wei),
        amount_wei: amount_wei.to_string(),
        transaction_hash: format_hash(&receipt.transaction_hash),
    }
}
