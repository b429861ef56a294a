//! Carbon ledger daemon: entry point for running a ledger node.

use anyhow::Context;
use carbon_node::{CarbonNode, NodeConfig, ShutdownController, StorageBackend};
use carbon_rpc::{AppState, RpcServer};
use carbon_types::AccountId;
use carbon_utils::{init_logging, LogFormat};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "carbon-daemon", about = "Carbon-credit issuance ledger daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "CARBON_CONFIG")]
    config: Option<PathBuf>,

    /// Owner identity for a freshly created ledger.
    #[arg(long, env = "CARBON_OWNER", value_parser = parse_account)]
    owner: Option<AccountId>,

    /// Data directory for ledger storage.
    #[arg(long, env = "CARBON_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend: "lmdb" or "memory".
    #[arg(long, env = "CARBON_STORAGE")]
    storage: Option<StorageBackend>,

    /// LMDB map size in bytes.
    #[arg(long, env = "CARBON_LMDB_MAP_SIZE")]
    lmdb_map_size: Option<usize>,

    /// Enable the RPC server.
    #[arg(long, env = "CARBON_ENABLE_RPC", num_args = 0..=1, default_missing_value = "true")]
    rpc: Option<bool>,

    #[arg(long, env = "CARBON_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Interface for the RPC server to bind.
    #[arg(long, env = "CARBON_RPC_BIND")]
    rpc_bind: Option<String>,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long, env = "CARBON_ENABLE_METRICS", num_args = 0..=1, default_missing_value = "true")]
    metrics: Option<bool>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CARBON_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CARBON_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Node lifecycle.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Inspect configuration.
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum NodeAction {
    /// Run the node.
    Run,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}

fn parse_account(raw: &str) -> Result<AccountId, carbon_types::TypesError> {
    AccountId::parse(raw)
}

impl Cli {
    /// Layer CLI flags and env vars over `base`.
    fn merge_into(&self, base: NodeConfig) -> NodeConfig {
        NodeConfig {
            owner: self.owner.clone().or(base.owner),
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            storage: self.storage.unwrap_or(base.storage),
            lmdb_map_size: self.lmdb_map_size.unwrap_or(base.lmdb_map_size),
            enable_rpc: self.rpc.unwrap_or(base.enable_rpc),
            rpc_port: self.rpc_port.unwrap_or(base.rpc_port),
            rpc_bind: self.rpc_bind.clone().unwrap_or(base.rpc_bind),
            enable_metrics: self.metrics.unwrap_or(base.enable_metrics),
            log_format: self.log_format.unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
        }
    }

    fn effective_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => NodeConfig::default(),
        };
        Ok(self.merge_into(base))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    match cli.command {
        Command::Config {
            action: ConfigAction::Show,
        } => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Node {
            action: NodeAction::Run,
        } => {
            init_logging(config.log_format, &config.log_level)?;
            if let Some(path) = &cli.config {
                tracing::info!(path = %path.display(), "loaded config file");
            }
            run(config).await
        }
    }
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let rpc = if config.enable_rpc {
        config.rpc_addr()
    } else {
        "off".to_string()
    };
    tracing::info!(
        storage = ?config.storage,
        data_dir = %config.data_dir.display(),
        rpc = %rpc,
        metrics = config.enable_metrics,
        "starting carbon ledger node"
    );

    let node = CarbonNode::open(config.clone()).context("failed to open ledger node")?;
    let shutdown = ShutdownController::new();
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    if config.enable_rpc {
        RpcServer::new(config.rpc_addr(), AppState::new(node))
            .start(&shutdown)
            .await
            .context("RPC server failed")?;
    } else {
        tracing::info!("RPC disabled; idling until shutdown");
        shutdown.wait().await;
    }

    signals.abort();
    tracing::info!("node stopped");
    Ok(())
}
