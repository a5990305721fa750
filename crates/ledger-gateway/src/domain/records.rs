//! Plain result records returned by the services.
//!
//! Field names serialize in camelCase so the HTTP layer can embed them as-is.

use serde::{Deserialize, Serialize};

/// Subsidy balance of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub address: String,
    pub balance: String,
    pub balance_wei: String,
}

/// Outstanding subsidy pool total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolBalanceView {
    pub pool_balance: String,
    pub pool_balance_wei: String,
}

/// Outcome of a confirmed mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    /// Target participant, only for `addSubsidy`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_address: Option<String>,
    pub amount: String,
    pub amount_wei: String,
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub contract_address: String,
    pub owner: String,
    pub total_subsidy_pool: String,
    pub total_subsidy_pool_wei: String,
    pub contract_balance: String,
    pub contract_balance_wei: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerView {
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatus {
    pub address: String,
    pub is_owner: bool,
    pub owner: String,
}

/// Contract event categories, in aggregation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SubsidyAdded,
    SubsidyWithdrawn,
    SubsidyPoolFunded,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::SubsidyAdded,
        EventKind::SubsidyWithdrawn,
        EventKind::SubsidyPoolFunded,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SubsidyAdded => "SubsidyAdded",
            EventKind::SubsidyWithdrawn => "SubsidyWithdrawn",
            EventKind::SubsidyPoolFunded => "SubsidyPoolFunded",
        }
    }

    /// Name of the event argument holding the participant address
    pub fn participant_field(&self) -> &'static str {
        match self {
            EventKind::SubsidyAdded | EventKind::SubsidyWithdrawn => "user",
            EventKind::SubsidyPoolFunded => "from",
        }
    }
}

/// One normalized contract event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub participant: String,
    pub amount: String,
    pub amount_wei: String,
    pub block_number: u64,
    pub transaction_hash: String,
    /// Block timestamps are not fetched per event
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    pub events: Vec<EventRecord>,
    pub total_events: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxOutcome {
    Success,
    Failed,
}

/// Receipt summary for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub transaction_hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub status: TxOutcome,
    pub gas_used: String,
    /// Gas price in gwei
    pub effective_gas_price: String,
    pub timestamp: Option<u64>,
    pub from: String,
    pub to: Option<String>,
    pub contract_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_wire_shape() {
        let record = EventRecord {
            kind: EventKind::SubsidyPoolFunded,
            participant: "0xabc".into(),
            amount: "1.0".into(),
            amount_wei: "1000000000000000000".into(),
            block_number: 7,
            transaction_hash: "0x01".into(),
            timestamp: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "SubsidyPoolFunded");
        assert_eq!(json["amountWei"], "1000000000000000000");
        assert_eq!(json["blockNumber"], 7);
        assert!(json["timestamp"].is_null());
    }

    #[test]
    fn test_transaction_result_omits_missing_user() {
        let result = TransactionResult {
            user_address: None,
            amount: "2.0".into(),
            amount_wei: "2000000000000000000".into(),
            transaction_hash: "0x02".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("userAddress").is_none());
        assert_eq!(json["transactionHash"], "0x02");
    }

    #[test]
    fn test_status_lowercase() {
        assert_eq!(serde_json::to_value(TxOutcome::Success).unwrap(), "success");
        assert_eq!(serde_json::to_value(TxOutcome::Failed).unwrap(), "failed");
    }
}
