//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use carbon_store_lmdb::environment::DEFAULT_MAP_SIZE;
use carbon_types::AccountId;
use carbon_utils::LogFormat;

use crate::NodeError;

/// Where the ledger snapshot and audit trail are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// LMDB environment under `data_dir`.
    #[default]
    Lmdb,
    /// In-process only; everything is lost on exit.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lmdb" => Ok(Self::Lmdb),
            "memory" => Ok(Self::Memory),
            other => Err(NodeError::Config(format!(
                "unknown storage backend '{other}' (expected 'lmdb' or 'memory')"
            ))),
        }
    }
}

/// Configuration for a carbon ledger node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Owner of a freshly created ledger. Ignored once a snapshot exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<AccountId>,

    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageBackend,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub lmdb_map_size: usize,

    /// Whether to enable the RPC server.
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Interface the RPC server binds to.
    #[serde(default = "default_rpc_bind")]
    pub rpc_bind: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to serve Prometheus metrics at `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./carbon_data")
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    7080
}

fn default_rpc_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// `host:port` the RPC server listens on.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            owner: None,
            data_dir: default_data_dir(),
            storage: StorageBackend::default(),
            lmdb_map_size: default_map_size(),
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            rpc_bind: default_rpc_bind(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
