//! Signed transaction submission and confirmation tracking.

use std::sync::Arc;
use std::time::Duration;

use primitive_types::U256;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::adapters::signer::{LegacyTransaction, LocalSigner};
use crate::domain::{
    format_hash, Address, Bytes, CallRequest, LedgerError, LedgerResult, RpcReceipt, TxHash,
};
use crate::ports::LedgerRpc;

/// Confirmation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks that must include or follow the transaction's block
    pub confirmations: u64,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Builds, signs and submits transactions for one signer.
///
/// Submissions are serialized: the write lock is held from nonce lookup until
/// the receipt is confirmed, so concurrent callers never race for a nonce.
pub struct TransactionSubmitter {
    rpc: Arc<dyn LedgerRpc>,
    signer: Arc<LocalSigner>,
    policy: ConfirmationPolicy,
    write_lock: Mutex<()>,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, signer: Arc<LocalSigner>, policy: ConfirmationPolicy) -> Self {
        Self {
            rpc,
            signer,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn policy(&self) -> ConfirmationPolicy {
        self.policy
    }

    /// Submit a contract call and suspend until it is confirmed.
    ///
    /// A mined receipt with status 0 is reported as [`LedgerError::TransactionReverted`].
    #[instrument(skip(self, data))]
    pub async fn submit_and_confirm(
        &self,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> LedgerResult<RpcReceipt> {
        let _guard = self.write_lock.lock().await;
        let from = self.signer.address();

        let nonce = self.rpc.transaction_count(from).await?;
        let gas_price = self.rpc.gas_price().await?;
        let chain_id = self.rpc.chain_id().await?;
        let gas_limit = self
            .rpc
            .estimate_gas(CallRequest {
                from: Some(from),
                to,
                value: (!value.is_zero()).then_some(value.into()),
                data: Bytes(data.clone()),
            })
            .await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: Some(to),
            value,
            data,
            chain_id,
        };
        let signed = self
            .signer
            .sign_legacy(&tx)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        let hash = self.rpc.send_raw_transaction(Bytes(signed.raw)).await?;
        if hash != signed.hash {
            warn!(
                local = %format_hash(&signed.hash),
                remote = %format_hash(&hash),
                "ledger reported a different transaction hash"
            );
        }
        info!(hash = %format_hash(&hash), from = ?from, nonce = %nonce, "transaction submitted");

        let receipt = self.wait_for_confirmation(hash).await?;
        if !receipt.succeeded() {
            warn!(hash = %format_hash(&hash), "transaction reverted");
            return Err(LedgerError::TransactionReverted {
                hash: format_hash(&hash),
            });
        }
        Ok(receipt)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> LedgerResult<RpcReceipt> {
        let required = self.policy.confirmations.max(1);
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(hash).await? {
                let included = receipt.block_number.to_u64().ok_or_else(|| {
                    LedgerError::Decode("receipt block number exceeds u64".into())
                })?;
                let head = self.rpc.block_number().await?;
                let confirmations = head.saturating_sub(included) + 1;
                debug!(hash = %format_hash(&hash), confirmations, required, "receipt observed");
                if confirmations >= required {
                    return Ok(receipt);
                }
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}
