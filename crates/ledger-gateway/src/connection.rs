//! Connection Manager: lifecycle of the single outbound ledger connection.
//!
//! Initialization never panics and never returns an error to the caller; the
//! outcome is reported as an [`InitOutcome`] and kept in [`ConnectionState`]
//! so the process can keep serving `/health` while the ledger is unavailable.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::abi::ContractInterface;
use crate::adapters::contract::SubsidyContract;
use crate::adapters::json_rpc::{ClientTimeouts, HttpConnector};
use crate::adapters::signer::LocalSigner;
use crate::domain::{parse_address, to_checksum, Address, LedgerError, LedgerResult};
use crate::ports::{LedgerConnector, LedgerRpc};
use crate::service::submitter::{ConfirmationPolicy, TransactionSubmitter};

/// Template value shipped in sample environment files
pub const PLACEHOLDER_PRIVATE_KEY: &str = "your_private_key_here";

/// Local development node
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Compiled artifact location relative to the working directory
pub const DEFAULT_ARTIFACT_PATH: &str =
    "Smart_Contracts/artifacts/contracts/UdavitGreenHydrogen.sol/UdavitGreenHydrogen.json";

/// Supported ledger networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Localhost,
    Sepolia,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Localhost => "localhost",
            Network::Sepolia => "sepolia",
            Network::Mainnet => "mainnet",
        }
    }

    /// Resolve the JSON-RPC endpoint for this network.
    ///
    /// Localhost honours an explicit URL; hosted networks go through Infura.
    pub fn endpoint(
        &self,
        rpc_url: Option<&str>,
        infura_project_id: Option<&str>,
    ) -> Result<String, InitFailure> {
        match self {
            Network::Localhost => Ok(non_empty(rpc_url)
                .unwrap_or(DEFAULT_LOCAL_RPC_URL)
                .to_string()),
            Network::Sepolia | Network::Mainnet => non_empty(infura_project_id)
                .map(|id| format!("https://{}.infura.io/v3/{}", self.as_str(), id))
                .ok_or(InitFailure::MissingEndpoint { network: *self }),
        }
    }
}

impl FromStr for Network {
    type Err = InitFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localhost" => Ok(Network::Localhost),
            "sepolia" => Ok(Network::Sepolia),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(InitFailure::InvalidNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Inputs for establishing the ledger connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// `localhost`, `sepolia` or `mainnet`
    pub network: String,
    /// Explicit endpoint for `localhost`
    pub rpc_url: Option<String>,
    pub infura_project_id: Option<String>,
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
    /// Zero address when unset
    pub contract_address: Option<String>,
    pub artifact_path: Option<PathBuf>,
    pub confirmations: u64,
    pub poll_interval_ms: u64,
    pub rpc_timeout_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            network: Network::Localhost.as_str().to_string(),
            rpc_url: None,
            infura_project_id: None,
            private_key: None,
            contract_address: None,
            artifact_path: Some(PathBuf::from(DEFAULT_ARTIFACT_PATH)),
            confirmations: 1,
            poll_interval_ms: 1_000,
            rpc_timeout_secs: 30,
        }
    }
}

impl LedgerSettings {
    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: self.confirmations.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn client_timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            request: Duration::from_secs(self.rpc_timeout_secs.max(1)),
            ..ClientTimeouts::default()
        }
    }
}

impl fmt::Debug for LedgerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSettings")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("infura_project_id", &self.infura_project_id.as_ref().map(|_| "<set>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("contract_address", &self.contract_address)
            .field("artifact_path", &self.artifact_path)
            .field("confirmations", &self.confirmations)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .finish()
    }
}

/// Why initialization did not reach `Ready`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitFailure {
    #[error("PRIVATE_KEY not set")]
    MissingCredential,
    #[error("PRIVATE_KEY still holds the template placeholder")]
    PlaceholderCredential,
    #[error("invalid private key: {0}")]
    InvalidCredential(String),
    #[error("contract interface not available: {0}")]
    MissingContractInterface(String),
    #[error("unsupported network: {0}")]
    InvalidNetwork(String),
    #[error("INFURA_PROJECT_ID not set for {network} network")]
    MissingEndpoint { network: Network },
    #[error("invalid contract address: {0}")]
    InvalidContractAddress(String),
    #[error("failed to open ledger transport: {0}")]
    Transport(String),
}

/// Lifecycle state of the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(InitFailure),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Initializing => "initializing",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

/// Result of an `initialize` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Ready,
    AlreadyReady,
    InProgress,
    Failed(InitFailure),
}

/// Everything needed to talk to the contract, created together
pub struct LedgerConnection {
    endpoint: String,
    network: Network,
    signer: Arc<LocalSigner>,
    contract: SubsidyContract,
    submitter: TransactionSubmitter,
}

impl LedgerConnection {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn contract(&self) -> &SubsidyContract {
        &self.contract
    }

    pub fn rpc(&self) -> &Arc<dyn LedgerRpc> {
        self.contract.rpc()
    }

    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }
}

impl fmt::Debug for LedgerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerConnection")
            .field("network", &self.network)
            .field("signer", &self.signer)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

struct Inner {
    state: ConnectionState,
    connection: Option<Arc<LedgerConnection>>,
}

/// Owner of the single ledger connection, shared by every service
pub struct ConnectionManager {
    connector: Arc<dyn LedgerConnector>,
    inner: RwLock<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn LedgerConnector>) -> Self {
        Self {
            connector,
            inner: RwLock::new(Inner {
                state: ConnectionState::Uninitialized,
                connection: None,
            }),
        }
    }

    /// Manager backed by JSON-RPC over HTTP.
    pub fn http(timeouts: ClientTimeouts) -> Self {
        Self::new(Arc::new(HttpConnector::new(timeouts)))
    }

    /// Establish the connection. A second call while ready is a no-op.
    pub fn initialize(&self, settings: &LedgerSettings) -> InitOutcome {
        {
            let mut inner = self.inner.write();
            match inner.state {
                ConnectionState::Ready => {
                    warn!("ledger connection already initialized");
                    return InitOutcome::AlreadyReady;
                }
                ConnectionState::Initializing => return InitOutcome::InProgress,
                _ => inner.state = ConnectionState::Initializing,
            }
        }
        self.complete(settings)
    }

    /// Drop the current connection and initialize again.
    pub fn reinitialize(&self, settings: &LedgerSettings) -> InitOutcome {
        {
            let mut inner = self.inner.write();
            if inner.state == ConnectionState::Initializing {
                return InitOutcome::InProgress;
            }
            inner.connection = None;
            inner.state = ConnectionState::Initializing;
        }
        info!("reinitializing ledger connection");
        self.complete(settings)
    }

    fn complete(&self, settings: &LedgerSettings) -> InitOutcome {
        let result = self.build(settings);
        let mut inner = self.inner.write();
        match result {
            Ok(connection) => {
                info!(
                    network = %connection.network,
                    signer = %to_checksum(&connection.signer_address()),
                    contract = %to_checksum(&connection.contract.address()),
                    "blockchain connection initialized"
                );
                inner.connection = Some(Arc::new(connection));
                inner.state = ConnectionState::Ready;
                InitOutcome::Ready
            }
            Err(failure) => {
                warn!(reason = %failure, "blockchain connection not initialized");
                inner.connection = None;
                inner.state = ConnectionState::Failed(failure.clone());
                InitOutcome::Failed(failure)
            }
        }
    }

    fn build(&self, settings: &LedgerSettings) -> Result<LedgerConnection, InitFailure> {
        let key = non_empty(settings.private_key.as_deref()).ok_or(InitFailure::MissingCredential)?;

        let interface = match &settings.artifact_path {
            Some(path) => ContractInterface::from_artifact_file(path)
                .map_err(|e| InitFailure::MissingContractInterface(e.to_string()))?,
            None => {
                return Err(InitFailure::MissingContractInterface(
                    "no contract artifact configured".into(),
                ))
            }
        };

        let network: Network = settings.network.trim().parse()?;
        let endpoint = network.endpoint(
            settings.rpc_url.as_deref(),
            settings.infura_project_id.as_deref(),
        )?;

        if key == PLACEHOLDER_PRIVATE_KEY {
            return Err(InitFailure::PlaceholderCredential);
        }
        let signer =
            Arc::new(LocalSigner::from_hex(key).map_err(|e| InitFailure::InvalidCredential(e.to_string()))?);

        let contract_address = match non_empty(settings.contract_address.as_deref()) {
            Some(text) => parse_address(text)
                .map_err(|e| InitFailure::InvalidContractAddress(format!("{text}: {e}")))?,
            None => Address::zero(),
        };

        let rpc = self
            .connector
            .connect(&endpoint)
            .map_err(|e| InitFailure::Transport(e.to_string()))?;

        let submitter =
            TransactionSubmitter::new(rpc.clone(), signer.clone(), settings.confirmation_policy());
        let contract = SubsidyContract::new(contract_address, Arc::new(interface), rpc);

        Ok(LedgerConnection {
            endpoint,
            network,
            signer,
            contract,
            submitter,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().connection.is_some()
    }

    /// The connection bundle, if ready.
    pub fn handles(&self) -> Option<Arc<LedgerConnection>> {
        self.inner.read().connection.clone()
    }

    /// The connection bundle, or `ConnectionNotReady`.
    pub fn require(&self) -> LedgerResult<Arc<LedgerConnection>> {
        self.handles().ok_or(LedgerError::ConnectionNotReady)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().state.clone()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.inner.read().state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::abi::SUBSIDY_POOL_ABI;
    use crate::adapters::in_memory::{InMemoryConnector, InMemoryLedger};
    use std::io::Write;
    use std::sync::{Mutex, OnceLock, Weak};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn artifact() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"abi":{}}}"#, SUBSIDY_POOL_ABI).unwrap();
        file
    }

    fn manager() -> ConnectionManager {
        let ledger = Arc::new(InMemoryLedger::new(Address::repeat_byte(0xcc), Address::zero()));
        ConnectionManager::new(Arc::new(InMemoryConnector::new(ledger)))
    }

    fn settings(artifact: &tempfile::NamedTempFile) -> LedgerSettings {
        LedgerSettings {
            private_key: Some(KEY.to_string()),
            artifact_path: Some(artifact.path().to_path_buf()),
            contract_address: Some(format!("0x{}", "cc".repeat(20))),
            ..LedgerSettings::default()
        }
    }

    fn failure_of(settings: &LedgerSettings) -> InitFailure {
        match manager().initialize(settings) {
            InitOutcome::Failed(reason) => reason,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_initialize_ready() {
        let file = artifact();
        let manager = manager();
        assert_eq!(manager.state(), ConnectionState::Uninitialized);
        assert!(!manager.is_ready());
        assert_eq!(manager.require().unwrap_err(), LedgerError::ConnectionNotReady);

        assert_eq!(manager.initialize(&settings(&file)), InitOutcome::Ready);
        assert!(manager.is_ready());
        assert_eq!(manager.state(), ConnectionState::Ready);

        let connection = manager.require().unwrap();
        assert_eq!(connection.endpoint(), DEFAULT_LOCAL_RPC_URL);
        assert_eq!(connection.network(), Network::Localhost);
        assert_eq!(
            to_checksum(&connection.signer_address()),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_second_initialize_is_noop() {
        let file = artifact();
        let manager = manager();
        manager.initialize(&settings(&file));
        let first = manager.handles().unwrap();

        assert_eq!(manager.initialize(&settings(&file)), InitOutcome::AlreadyReady);
        let second = manager.handles().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reinitialize_replaces_connection() {
        let file = artifact();
        let manager = manager();
        manager.initialize(&settings(&file));
        let first = manager.handles().unwrap();

        assert_eq!(manager.reinitialize(&settings(&file)), InitOutcome::Ready);
        let second = manager.handles().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let broken = LedgerSettings {
            private_key: None,
            ..settings(&file)
        };
        assert_eq!(
            manager.reinitialize(&broken),
            InitOutcome::Failed(InitFailure::MissingCredential)
        );
        assert!(!manager.is_ready());
    }

    #[test]
    fn test_failure_reasons() {
        let file = artifact();
        let base = settings(&file);

        assert_eq!(
            failure_of(&LedgerSettings { private_key: None, ..base.clone() }),
            InitFailure::MissingCredential
        );
        assert_eq!(
            failure_of(&LedgerSettings { private_key: Some("  ".into()), ..base.clone() }),
            InitFailure::MissingCredential
        );
        assert_eq!(
            failure_of(&LedgerSettings {
                private_key: Some(PLACEHOLDER_PRIVATE_KEY.into()),
                ..base.clone()
            }),
            InitFailure::PlaceholderCredential
        );
        assert!(matches!(
            failure_of(&LedgerSettings { private_key: Some("0x1234".into()), ..base.clone() }),
            InitFailure::InvalidCredential(_)
        ));
        assert!(matches!(
            failure_of(&LedgerSettings { artifact_path: None, ..base.clone() }),
            InitFailure::MissingContractInterface(_)
        ));
        assert!(matches!(
            failure_of(&LedgerSettings {
                artifact_path: Some(PathBuf::from("/nonexistent/artifact.json")),
                ..base.clone()
            }),
            InitFailure::MissingContractInterface(_)
        ));
        assert_eq!(
            failure_of(&LedgerSettings { network: "goerli".into(), ..base.clone() }),
            InitFailure::InvalidNetwork("goerli".into())
        );
        assert_eq!(
            failure_of(&LedgerSettings { network: "sepolia".into(), ..base.clone() }),
            InitFailure::MissingEndpoint { network: Network::Sepolia }
        );
        assert!(matches!(
            failure_of(&LedgerSettings {
                contract_address: Some("0x1234".into()),
                ..base.clone()
            }),
            InitFailure::InvalidContractAddress(_)
        ));
    }

    #[test]
    fn test_failed_state_is_reported() {
        let manager = manager();
        let outcome = manager.initialize(&LedgerSettings::default());
        assert_eq!(outcome, InitOutcome::Failed(InitFailure::MissingCredential));
        assert_eq!(
            manager.state(),
            ConnectionState::Failed(InitFailure::MissingCredential)
        );
        assert_eq!(manager.state().as_str(), "failed");
    }

    #[test]
    fn test_contract_address_defaults_to_zero() {
        let file = artifact();
        let manager = manager();
        manager.initialize(&LedgerSettings {
            contract_address: None,
            ..settings(&file)
        });
        assert_eq!(manager.require().unwrap().contract().address(), Address::zero());
    }

    #[test]
    fn test_endpoint_selection() {
        assert_eq!(
            Network::Localhost.endpoint(Some("http://node:8545"), None).unwrap(),
            "http://node:8545"
        );
        assert_eq!(
            Network::Localhost.endpoint(Some(""), None).unwrap(),
            DEFAULT_LOCAL_RPC_URL
        );
        assert_eq!(
            Network::Sepolia.endpoint(None, Some("abc")).unwrap(),
            "https://sepolia.infura.io/v3/abc"
        );
        assert_eq!(
            Network::Mainnet.endpoint(Some("http://ignored"), Some("abc")).unwrap(),
            "https://mainnet.infura.io/v3/abc"
        );
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let file = artifact();
        let printed = format!("{:?}", settings(&file));
        assert!(!printed.contains("ac0974bec39a17e3"));
        assert!(printed.contains("<redacted>"));
    }

    /// Connector that re-enters the manager while a connection is being built.
    struct ReentrantConnector {
        ledger: Arc<InMemoryLedger>,
        manager: OnceLock<Weak<ConnectionManager>>,
        settings: LedgerSettings,
        observed: Mutex<Option<InitOutcome>>,
    }

    impl LedgerConnector for ReentrantConnector {
        fn connect(&self, _endpoint: &str) -> LedgerResult<Arc<dyn LedgerRpc>> {
            if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
                *self.observed.lock().unwrap() = Some(manager.initialize(&self.settings));
            }
            Ok(self.ledger.clone())
        }
    }

    #[test]
    fn test_concurrent_initialize_reports_in_progress() {
        let file = artifact();
        let connector = Arc::new(ReentrantConnector {
            ledger: Arc::new(InMemoryLedger::new(Address::zero(), Address::zero())),
            manager: OnceLock::new(),
            settings: settings(&file),
            observed: Mutex::new(None),
        });
        let manager = Arc::new(ConnectionManager::new(connector.clone()));
        connector.manager.set(Arc::downgrade(&manager)).unwrap();

        assert_eq!(manager.initialize(&settings(&file)), InitOutcome::Ready);
        assert_eq!(
            connector.observed.lock().unwrap().clone(),
            Some(InitOutcome::InProgress)
        );
    }
}
