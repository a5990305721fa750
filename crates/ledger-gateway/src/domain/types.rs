//! Core ledger types with Ethereum JSON-RPC serialization.
//!
//! Wire quantities are `0x`-prefixed hex strings; byte blobs are `0x`-prefixed hex.

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub use primitive_types::{H160 as Address, H256 as TxHash};

/// Block number type (u64)
pub type BlockNumber = u64;

/// U256 with hex string serialization for JSON-RPC compatibility.
///
/// Serializes as `"0x..."`, deserializes from hex string, decimal string or number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct Quantity(pub U256);

impl Quantity {
    pub const ZERO: Quantity = Quantity(U256::zero());

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn into_inner(self) -> U256 {
        self.0
    }

    /// Narrow to u64, failing instead of truncating.
    pub fn to_u64(self) -> Option<u64> {
        if self.0 > U256::from(u64::MAX) {
            None
        } else {
            Some(self.0.as_u64())
        }
    }
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Quantity(U256::from(v))
    }
}

impl From<U256> for Quantity {
    fn from(v: U256) -> Self {
        Quantity(v)
    }
}

impl From<Quantity> for U256 {
    fn from(v: Quantity) -> Self {
        v.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{:x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuantityVisitor;

        impl<'de> de::Visitor<'de> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a hex string starting with 0x or a number")
            }

            fn visit_str<E>(self, value: &str) -> Result<Quantity, E>
            where
                E: de::Error,
            {
                if let Some(hex_str) = value
                    .strip_prefix("0x")
                    .or_else(|| value.strip_prefix("0X"))
                {
                    if hex_str.is_empty() {
                        return Ok(Quantity::ZERO);
                    }
                    U256::from_str_radix(hex_str, 16)
                        .map(Quantity)
                        .map_err(|_| de::Error::custom("invalid hex string for quantity"))
                } else {
                    U256::from_dec_str(value)
                        .map(Quantity)
                        .map_err(|_| de::Error::custom("invalid decimal string for quantity"))
                }
            }

            fn visit_u64<E>(self, value: u64) -> Result<Quantity, E>
            where
                E: de::Error,
            {
                Ok(Quantity::from(value))
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

/// Bytes wrapper with hex serialization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s)
            .map(Bytes)
            .map_err(|_| de::Error::custom("invalid hex bytes"))
    }
}

/// Block bound for log queries: an explicit height or a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Number(BlockNumber),
    Tag(BlockTag),
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId::Tag(BlockTag::Latest)
    }
}

impl Serialize for BlockId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            BlockId::Number(n) => serializer.serialize_str(&format!("0x{:x}", n)),
            BlockId::Tag(tag) => serializer.serialize_str(tag.as_str()),
        }
    }
}

impl FromStr for BlockId {
    type Err = &'static str;

    /// Accepts a tag, a decimal height or a `0x` hex height.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(tag) = BlockTag::from_str(s) {
            return Ok(BlockId::Tag(tag));
        }
        if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u64::from_str_radix(hex_str, 16)
                .map(BlockId::Number)
                .map_err(|_| "invalid hex block number");
        }
        s.parse::<u64>()
            .map(BlockId::Number)
            .map_err(|_| "invalid block number or tag")
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Number(n) => write!(f, "{}", n),
            BlockId::Tag(tag) => f.write_str(tag.as_str()),
        }
    }
}

/// Block tags for JSON-RPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
}

impl BlockTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockTag::Latest => "latest",
            BlockTag::Earliest => "earliest",
            BlockTag::Pending => "pending",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
        }
    }
}

impl FromStr for BlockTag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(BlockTag::Latest),
            "earliest" => Ok(BlockTag::Earliest),
            "pending" => Ok(BlockTag::Pending),
            "safe" => Ok(BlockTag::Safe),
            "finalized" => Ok(BlockTag::Finalized),
            _ => Err("invalid block tag"),
        }
    }
}

/// Transaction call object for eth_call and eth_estimateGas
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    pub data: Bytes,
}

/// Filter for eth_getLogs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: BlockId,
    pub to_block: BlockId,
    pub address: Address,
    /// Topic0 only; the gateway never filters on indexed arguments.
    pub topics: Vec<TxHash>,
}

/// Raw log entry as returned by eth_getLogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<TxHash>,
    pub data: Bytes,
    pub block_number: Option<Quantity>,
    pub transaction_hash: Option<TxHash>,
    #[serde(default)]
    pub log_index: Option<Quantity>,
}

/// Transaction receipt as returned by eth_getTransactionReceipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Quantity,
    pub block_hash: TxHash,
    /// 1 = success, 0 = reverted
    pub status: Quantity,
    pub gas_used: Quantity,
    #[serde(default)]
    pub effective_gas_price: Quantity,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
}

impl RpcReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.0 == U256::one()
    }
}

/// Block header subset used for timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: Quantity,
    pub hash: TxHash,
    pub timestamp: Quantity,
}
