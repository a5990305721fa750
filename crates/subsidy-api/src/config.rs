//! API configuration with validation.
//!
//! Values come from CLI flags with environment fallbacks; see [`CliArgs`].

use clap::Parser;
use ledger_gateway::connection::{DEFAULT_ARTIFACT_PATH, DEFAULT_LOCAL_RPC_URL};
use ledger_gateway::LedgerSettings;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::LogFormat;

/// Main API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub http: HttpConfig,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    /// Ledger connection inputs
    pub ledger: LedgerSettings,
}

impl ApiConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        if self.limits.max_events_limit == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_events_limit cannot be 0".into(),
            ));
        }

        if self.timeouts.request.as_millis() == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request timeout cannot be 0".into(),
            ));
        }

        if self.ledger.confirmations == 0 {
            return Err(ConfigError::Invalid("confirmations must be at least 1".into()));
        }

        if self.ledger.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "poll interval cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: IpAddr,
    /// Port (default: 3000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
        }
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max JSON body size in bytes
    pub max_request_size: usize,
    /// Upper bound for the `limit` query parameter of `/api/contract/events`
    pub max_events_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 100 * 1024,
            max_events_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline, confirmation waits included
    #[serde(with = "humantime_serde")]
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(120),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: 86400, // 24 hours
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Subsidy API: HTTP gateway for the subsidy pool contract
#[derive(Parser, Debug, Clone)]
#[command(name = "subsidy-api", version)]
#[command(about = "HTTP gateway for the subsidy pool contract")]
pub struct CliArgs {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Ledger network: localhost, sepolia or mainnet
    #[arg(long, env = "NETWORK", default_value = "localhost")]
    pub network: String,

    /// JSON-RPC endpoint used for the localhost network
    #[arg(long, env = "CUSTOM_RPC_URL", default_value = DEFAULT_LOCAL_RPC_URL)]
    pub rpc_url: String,

    #[arg(long, env = "INFURA_PROJECT_ID")]
    pub infura_project_id: Option<String>,

    /// Hex-encoded signing key
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<String>,

    /// Compiled contract artifact holding the ABI
    #[arg(long, env = "CONTRACT_ARTIFACT", default_value = DEFAULT_ARTIFACT_PATH)]
    pub contract_artifact: PathBuf,

    /// Blocks required before a transaction counts as confirmed
    #[arg(long, env = "CONFIRMATIONS", default_value_t = 1)]
    pub confirmations: u64,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "MAX_EVENTS_LIMIT", default_value_t = 1000)]
    pub max_events_limit: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,
}

impl CliArgs {
    pub fn into_config(self) -> ApiConfig {
        ApiConfig {
            http: HttpConfig {
                host: self.host,
                port: self.port,
            },
            limits: LimitsConfig {
                max_events_limit: self.max_events_limit,
                ..LimitsConfig::default()
            },
            timeouts: TimeoutConfig {
                request: Duration::from_secs(self.request_timeout_secs),
            },
            cors: CorsConfig::default(),
            logging: LoggingConfig {
                level: self.log_level,
                format: self.log_format,
            },
            ledger: LedgerSettings {
                network: self.network,
                rpc_url: Some(self.rpc_url),
                infura_project_id: self.infura_project_id,
                private_key: self.private_key,
                contract_address: self.contract_address,
                artifact_path: Some(self.contract_artifact),
                confirmations: self.confirmations,
                poll_interval_ms: self.poll_interval_ms,
                ..LedgerSettings::default()
            },
        }
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
