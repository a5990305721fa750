//! Contract interface loaded from a compiled artifact.
//!
//! Only the static ABI types the subsidy contract uses are encoded
//! (`address`, `uintN`, `bool`, `bytes32`). Selectors and event topics are
//! derived from the declared signatures, so a recompiled contract with a
//! changed signature is caught at load time rather than at call time.

use std::collections::HashMap;
use std::path::Path;

use primitive_types::U256;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{keccak256, Address, RpcLog, TxHash};

/// Functions the gateway calls, by canonical signature
pub const REQUIRED_FUNCTIONS: [&str; 7] = [
    "owner()",
    "totalSubsidyPool()",
    "getSubsidy(address)",
    "addSubsidy(address,uint256)",
    "withdrawSubsidy()",
    "fundSubsidyPool()",
    "withdrawRemaining()",
];

/// Events the gateway aggregates, by canonical signature
pub const REQUIRED_EVENTS: [&str; 3] = [
    "SubsidyAdded(address,uint256)",
    "SubsidyWithdrawn(address,uint256)",
    "SubsidyPoolFunded(address,uint256)",
];

/// ABI of the subsidy pool contract as emitted by the Solidity compiler.
pub const SUBSIDY_POOL_ABI: &str = r#"[
  {"type":"constructor","inputs":[],"stateMutability":"nonpayable"},
  {"type":"event","name":"SubsidyAdded","anonymous":false,"inputs":[
    {"name":"user","type":"address","indexed":true},
    {"name":"amount","type":"uint256","indexed":false}]},
  {"type":"event","name":"SubsidyWithdrawn","anonymous":false,"inputs":[
    {"name":"user","type":"address","indexed":true},
    {"name":"amount","type":"uint256","indexed":false}]},
  {"type":"event","name":"SubsidyPoolFunded","anonymous":false,"inputs":[
    {"name":"from","type":"address","indexed":true},
    {"name":"amount","type":"uint256","indexed":false}]},
  {"type":"function","name":"owner","inputs":[],
    "outputs":[{"name":"","type":"address"}],"stateMutability":"view"},
  {"type":"function","name":"totalSubsidyPool","inputs":[],
    "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
  {"type":"function","name":"getSubsidy","inputs":[{"name":"user","type":"address"}],
    "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
  {"type":"function","name":"addSubsidy","inputs":[
    {"name":"user","type":"address"},{"name":"amount","type":"uint256"}],
    "outputs":[],"stateMutability":"nonpayable"},
  {"type":"function","name":"withdrawSubsidy","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
  {"type":"function","name":"fundSubsidyPool","inputs":[],"outputs":[],"stateMutability":"payable"},
  {"type":"function","name":"withdrawRemaining","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
  {"type":"receive","stateMutability":"payable"}
]"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("failed to read contract artifact: {0}")]
    Io(String),
    #[error("contract artifact is not valid JSON: {0}")]
    Json(String),
    #[error("contract ABI is missing function {0}")]
    MissingFunction(&'static str),
    #[error("contract ABI is missing event {0}")]
    MissingEvent(&'static str),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("unknown event {0}")]
    UnknownEvent(String),
    #[error("function {name} takes {expected} arguments, got {actual}")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("argument {index} of {name} does not match type {kind}")]
    ArgumentType {
        name: String,
        index: usize,
        kind: String,
    },
    #[error("unsupported ABI type {0}")]
    UnsupportedType(String),
    #[error("return data too short: expected {expected} bytes, got {actual}")]
    ShortData { expected: usize, actual: usize },
    #[error("log does not match event {0}")]
    LogMismatch(String),
}

/// One ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Bool(bool),
    FixedBytes([u8; 32]),
}

impl Token {
    pub fn into_address(self) -> Option<Address> {
        match self {
            Token::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<U256> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(a) => word[12..].copy_from_slice(a.as_bytes()),
            Token::Uint(v) => v.to_big_endian(&mut word),
            Token::Bool(b) => word[31] = u8::from(*b),
            Token::FixedBytes(b) => word = *b,
        }
        word
    }
}

/// Static ABI types understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Address,
    Uint,
    Bool,
    Bytes32,
}

impl ParamKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "address" => Some(ParamKind::Address),
            "bool" => Some(ParamKind::Bool),
            "bytes32" => Some(ParamKind::Bytes32),
            k if k.starts_with("uint") => Some(ParamKind::Uint),
            _ => None,
        }
    }

    fn accepts(&self, token: &Token) -> bool {
        matches!(
            (self, token),
            (ParamKind::Address, Token::Address(_))
                | (ParamKind::Uint, Token::Uint(_))
                | (ParamKind::Bool, Token::Bool(_))
                | (ParamKind::Bytes32, Token::FixedBytes(_))
        )
    }

    fn decode(&self, word: &[u8]) -> Token {
        match self {
            ParamKind::Address => Token::Address(Address::from_slice(&word[12..32])),
            ParamKind::Uint => Token::Uint(U256::from_big_endian(&word[..32])),
            ParamKind::Bool => Token::Bool(word[31] != 0),
            ParamKind::Bytes32 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&word[..32]);
                Token::FixedBytes(out)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    indexed: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(default)]
    anonymous: bool,
}

fn default_entry_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Artifact { abi: Vec<RawEntry> },
    Bare(Vec<RawEntry>),
}

/// Parameter as declared in the ABI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: String,
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub signature: String,
    pub selector: [u8; 4],
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub signature: String,
    pub topic: TxHash,
    pub inputs: Vec<Param>,
}

/// Event arguments by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedLog {
    values: Vec<(String, Token)>,
}

impl DecodedLog {
    pub fn get(&self, name: &str) -> Option<&Token> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn address(&self, name: &str) -> Option<Address> {
        self.get(name).cloned().and_then(Token::into_address)
    }

    pub fn uint(&self, name: &str) -> Option<U256> {
        self.get(name).cloned().and_then(Token::into_uint)
    }
}

/// Parsed contract interface keyed by function and event name
#[derive(Debug, Clone)]
pub struct ContractInterface {
    functions: HashMap<String, Function>,
    events: HashMap<String, Event>,
}

impl ContractInterface {
    /// Load a Hardhat/Foundry artifact (`{"abi": [...]}`) or a bare ABI array.
    pub fn from_artifact_file(path: &Path) -> Result<Self, AbiError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AbiError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, AbiError> {
        let file: ArtifactFile =
            serde_json::from_str(text).map_err(|e| AbiError::Json(e.to_string()))?;
        let entries = match file {
            ArtifactFile::Artifact { abi } => abi,
            ArtifactFile::Bare(entries) => entries,
        };
        let interface = Self::from_entries(entries);
        interface.check_required()?;
        Ok(interface)
    }

    /// Interface of the subsidy pool contract built from [`SUBSIDY_POOL_ABI`].
    pub fn subsidy_pool() -> Self {
        let entries: Vec<RawEntry> = serde_json::from_str(SUBSIDY_POOL_ABI).unwrap_or_default();
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<RawEntry>) -> Self {
        let mut functions = HashMap::new();
        let mut events = HashMap::new();

        for entry in entries {
            let inputs: Vec<Param> = entry.inputs.into_iter().map(Param::from).collect();
            let signature = signature_of(&entry.name, &inputs);
            match entry.kind.as_str() {
                "function" => {
                    let hash = keccak256(signature.as_bytes());
                    let selector = [hash[0], hash[1], hash[2], hash[3]];
                    functions.insert(
                        entry.name.clone(),
                        Function {
                            name: entry.name,
                            signature,
                            selector,
                            inputs,
                            outputs: entry.outputs.into_iter().map(Param::from).collect(),
                        },
                    );
                }
                "event" if !entry.anonymous => {
                    events.insert(
                        entry.name.clone(),
                        Event {
                            name: entry.name,
                            topic: TxHash::from(keccak256(signature.as_bytes())),
                            signature,
                            inputs,
                        },
                    );
                }
                _ => {}
            }
        }

        Self { functions, events }
    }

    fn check_required(&self) -> Result<(), AbiError> {
        for required in REQUIRED_FUNCTIONS {
            if !self.functions.values().any(|f| f.signature == required) {
                return Err(AbiError::MissingFunction(required));
            }
        }
        for required in REQUIRED_EVENTS {
            if !self.events.values().any(|e| e.signature == required) {
                return Err(AbiError::MissingEvent(required));
            }
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Result<&Function, AbiError> {
        self.functions
            .get(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    pub fn event(&self, name: &str) -> Result<&Event, AbiError> {
        self.events
            .get(name)
            .ok_or_else(|| AbiError::UnknownEvent(name.to_string()))
    }

    /// Selector followed by the encoded arguments.
    pub fn encode_call(&self, name: &str, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let function = self.function(name)?;
        if function.inputs.len() != args.len() {
            return Err(AbiError::ArgumentCount {
                name: name.to_string(),
                expected: function.inputs.len(),
                actual: args.len(),
            });
        }

        let mut data = Vec::with_capacity(4 + 32 * args.len());
        data.extend_from_slice(&function.selector);
        for (index, (param, token)) in function.inputs.iter().zip(args).enumerate() {
            let kind = ParamKind::parse(&param.kind)
                .ok_or_else(|| AbiError::UnsupportedType(param.kind.clone()))?;
            if !kind.accepts(token) {
                return Err(AbiError::ArgumentType {
                    name: name.to_string(),
                    index,
                    kind: param.kind.clone(),
                });
            }
            data.extend_from_slice(&token.to_word());
        }
        Ok(data)
    }

    /// Decode the return words of a call.
    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        let function = self.function(name)?;
        let expected = 32 * function.outputs.len();
        if data.len() < expected {
            return Err(AbiError::ShortData {
                expected,
                actual: data.len(),
            });
        }

        function
            .outputs
            .iter()
            .zip(data.chunks(32))
            .map(|(param, word)| {
                ParamKind::parse(&param.kind)
                    .map(|kind| kind.decode(word))
                    .ok_or_else(|| AbiError::UnsupportedType(param.kind.clone()))
            })
            .collect()
    }

    /// Decode a log emitted by `event`. Indexed arguments come from topics,
    /// the rest from consecutive data words.
    pub fn decode_log(&self, event: &str, log: &RpcLog) -> Result<DecodedLog, AbiError> {
        let definition = self.event(event)?;
        if log.topics.first() != Some(&definition.topic) {
            return Err(AbiError::LogMismatch(event.to_string()));
        }

        let mut topics = log.topics.iter().skip(1);
        let mut words = log.data.as_slice().chunks(32);
        let mut values = Vec::with_capacity(definition.inputs.len());

        for param in &definition.inputs {
            let kind = ParamKind::parse(&param.kind)
                .ok_or_else(|| AbiError::UnsupportedType(param.kind.clone()))?;
            let word = if param.indexed {
                topics.next().map(|t| t.as_bytes())
            } else {
                words.next().filter(|w| w.len() == 32)
            };
            let word = word.ok_or_else(|| AbiError::LogMismatch(event.to_string()))?;
            values.push((param.name.clone(), kind.decode(word)));
        }

        Ok(DecodedLog { values })
    }

    /// Encode event topics and data, the inverse of [`decode_log`](Self::decode_log).
    pub fn encode_log(
        &self,
        event: &str,
        args: &[Token],
    ) -> Result<(Vec<TxHash>, Vec<u8>), AbiError> {
        let definition = self.event(event)?;
        if definition.inputs.len() != args.len() {
            return Err(AbiError::ArgumentCount {
                name: event.to_string(),
                expected: definition.inputs.len(),
                actual: args.len(),
            });
        }
        let mut topics = vec![definition.topic];
        let mut data = Vec::new();
        for (param, token) in definition.inputs.iter().zip(args) {
            if param.indexed {
                topics.push(TxHash::from(token.to_word()));
            } else {
                data.extend_from_slice(&token.to_word());
            }
        }
        Ok((topics, data))
    }

    /// Function whose selector prefixes `data`, if any.
    pub fn function_by_selector(&self, data: &[u8]) -> Option<&Function> {
        let selector = data.get(..4)?;
        self.functions.values().find(|f| f.selector[..] == *selector)
    }

    /// Split call data into the called function and its arguments.
    pub fn decode_call(&self, data: &[u8]) -> Result<(&Function, Vec<Token>), AbiError> {
        let function = self.function_by_selector(data).ok_or_else(|| {
            AbiError::UnknownFunction(format!("0x{}", hex::encode(data.get(..4).unwrap_or(data))))
        })?;
        let body = &data[4..];
        let expected = 32 * function.inputs.len();
        if body.len() < expected {
            return Err(AbiError::ShortData {
                expected,
                actual: body.len(),
            });
        }

        let args = function
            .inputs
            .iter()
            .zip(body.chunks(32))
            .map(|(param, word)| {
                ParamKind::parse(&param.kind)
                    .map(|kind| kind.decode(word))
                    .ok_or_else(|| AbiError::UnsupportedType(param.kind.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((function, args))
    }
}

impl From<RawParam> for Param {
    fn from(raw: RawParam) -> Self {
        Param {
            name: raw.name,
            kind: canonical_type(&raw.kind),
            indexed: raw.indexed,
        }
    }
}

fn canonical_type(kind: &str) -> String {
    match kind {
        "uint" => "uint256".to_string(),
        "int" => "int256".to_string(),
        other => other.to_string(),
    }
}

fn signature_of(name: &str, inputs: &[Param]) -> String {
    let types: Vec<&str> = inputs.iter().map(|p| p.kind.as_str()).collect();
    format!("{}({})", name, types.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bytes, Quantity};
    use std::io::Write;

    #[test]
    fn test_builtin_interface_has_required_entries() {
        ContractInterface::subsidy_pool().check_required().unwrap();
    }

    #[test]
    fn test_known_selectors() {
        let abi = ContractInterface::subsidy_pool();
        // keccak256("owner()")[..4]
        assert_eq!(abi.function("owner").unwrap().selector, [0x8d, 0xa5, 0xcb, 0x5b]);
    }

    #[test]
    fn test_encode_call() {
        let abi = ContractInterface::subsidy_pool();
        let user = Address::repeat_byte(0xab);
        let data = abi
            .encode_call("addSubsidy", &[Token::Address(user), Token::Uint(U256::from(5u64))])
            .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &abi.function("addSubsidy").unwrap().selector);
        assert_eq!(&data[16..36], user.as_bytes());
        assert_eq!(data[67], 5);
    }

    #[test]
    fn test_encode_call_checks_arguments() {
        let abi = ContractInterface::subsidy_pool();
        assert!(matches!(
            abi.encode_call("addSubsidy", &[Token::Bool(true)]),
            Err(AbiError::ArgumentCount { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            abi.encode_call("getSubsidy", &[Token::Uint(U256::one())]),
            Err(AbiError::ArgumentType { index: 0, .. })
        ));
        assert!(matches!(
            abi.encode_call("mint", &[]),
            Err(AbiError::UnknownFunction(_))
        ));
    }

    #[test]
    fn test_decode_call() {
        let abi = ContractInterface::subsidy_pool();
        let user = Address::repeat_byte(0x07);
        let data = abi.encode_call("getSubsidy", &[Token::Address(user)]).unwrap();
        let (function, args) = abi.decode_call(&data).unwrap();
        assert_eq!(function.name, "getSubsidy");
        assert_eq!(args, vec![Token::Address(user)]);

        assert!(matches!(
            abi.decode_call(&[0xff, 0xff, 0xff, 0xff]),
            Err(AbiError::UnknownFunction(_))
        ));
        assert!(abi.decode_call(&[0x01]).is_err());
    }

    #[test]
    fn test_decode_output() {
        let abi = ContractInterface::subsidy_pool();
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(Address::repeat_byte(0x11).as_bytes());
        let tokens = abi.decode_output("owner", &word).unwrap();
        assert_eq!(tokens, vec![Token::Address(Address::repeat_byte(0x11))]);

        assert!(matches!(
            abi.decode_output("owner", &[]),
            Err(AbiError::ShortData { expected: 32, actual: 0 })
        ));
    }

    #[test]
    fn test_log_roundtrip_uses_indexed_flags() {
        let abi = ContractInterface::subsidy_pool();
        let from = Address::repeat_byte(0x33);
        let (topics, data) = abi
            .encode_log("SubsidyPoolFunded", &[Token::Address(from), Token::Uint(U256::from(9u64))])
            .unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(data.len(), 32);

        let log = RpcLog {
            address: Address::zero(),
            topics,
            data: Bytes(data),
            block_number: Some(Quantity::from(1u64)),
            transaction_hash: None,
            log_index: None,
        };
        let decoded = abi.decode_log("SubsidyPoolFunded", &log).unwrap();
        assert_eq!(decoded.address("from"), Some(from));
        assert_eq!(decoded.uint("amount"), Some(U256::from(9u64)));

        assert!(matches!(
            abi.decode_log("SubsidyAdded", &log),
            Err(AbiError::LogMismatch(_))
        ));
    }

    #[test]
    fn test_non_indexed_participant_comes_from_data() {
        let json = SUBSIDY_POOL_ABI.replace(
            r#"{"name":"user","type":"address","indexed":true}"#,
            r#"{"name":"user","type":"address","indexed":false}"#,
        );
        let abi = ContractInterface::from_json(&json).unwrap();
        let user = Address::repeat_byte(0x44);
        let (topics, data) = abi
            .encode_log("SubsidyAdded", &[Token::Address(user), Token::Uint(U256::one())])
            .unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(data.len(), 64);
    }

    #[test]
    fn test_load_artifact_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"contractName":"SubsidyPool","abi":{}}}"#, SUBSIDY_POOL_ABI).unwrap();
        let abi = ContractInterface::from_artifact_file(file.path()).unwrap();
        assert!(abi.function("fundSubsidyPool").is_ok());
    }

    #[test]
    fn test_load_rejects_incomplete_abi() {
        let json = r#"{"abi":[{"type":"function","name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}]}]}"#;
        assert_eq!(
            ContractInterface::from_json(json).unwrap_err(),
            AbiError::MissingFunction("totalSubsidyPool()")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = ContractInterface::from_artifact_file(Path::new("/nonexistent/artifact.json"))
            .unwrap_err();
        assert!(matches!(err, AbiError::Io(_)));
    }
}
