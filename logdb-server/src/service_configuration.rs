use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use logdb_paxos::NodeSettings;
use serde::{Deserialize, Serialize};

use crate::args_parse::Args;

/// configuration settings loaded from the config file
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoadConfiguration {
    /// This node's listen address and identity
    pub(crate) node: NodeConfig,
    /// Every cluster member as `host:port`, this node included
    #[serde(default)]
    pub(crate) peers: Vec<String>,
    /// Directory holding `log/` and `kv/`
    pub(crate) data_dir: PathBuf,
    #[serde(default)]
    pub(crate) rpc: RpcConfig,
    #[serde(default)]
    pub(crate) append: AppendConfig,
    #[serde(default)]
    pub(crate) index: IndexConfig,
    #[serde(default)]
    pub(crate) tail: TailConfig,
    /// Optional TLS for both serving and calling peers
    pub(crate) tls: Option<TlsConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NodeConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    /// Name other peers use for this node, defaults to `host:port`
    pub(crate) advertised_addr: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RpcConfig {
    pub(crate) timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AppendConfig {
    pub(crate) max_attempts: usize,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexConfig {
    pub(crate) poll_interval_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TailConfig {
    pub(crate) wait_ms: u64,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self { wait_ms: 15000 }
    }
}

/// PEM file paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TlsConfig {
    pub(crate) ca: PathBuf,
    pub(crate) cert: PathBuf,
    pub(crate) key: PathBuf,
}

/// validated settings the node is started with
#[derive(Debug)]
pub(crate) struct ServiceConfiguration {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) advertised_addr: String,
    pub(crate) peers: Vec<String>,
    pub(crate) data_dir: PathBuf,
    pub(crate) rpc_timeout: Duration,
    pub(crate) node: NodeSettings,
    pub(crate) tls: Option<TlsConfig>,
}

impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let listen_addr: SocketAddr = format!("{}:{}", config.node.host, config.node.port)
            .parse()
            .context("Failed to create listen_addr")?;

        let advertised_addr = config
            .node
            .advertised_addr
            .unwrap_or_else(|| format!("{}:{}", config.node.host, config.node.port));

        if config.append.max_attempts == 0 {
            bail!("append.max_attempts must be at least 1");
        }
        if config.rpc.timeout_ms == 0 {
            bail!("rpc.timeout_ms must be positive");
        }

        Ok(ServiceConfiguration {
            listen_addr,
            advertised_addr,
            peers: config.peers,
            data_dir: config.data_dir,
            rpc_timeout: Duration::from_millis(config.rpc.timeout_ms),
            node: NodeSettings {
                append_attempts: config.append.max_attempts,
                tail_wait: Duration::from_millis(config.tail.wait_ms),
                index_poll: Duration::from_millis(config.index.poll_interval_ms.max(1)),
            },
            tls: config.tls,
        })
    }
}

impl ServiceConfiguration {
    /// Command line values win over the config file.
    pub(crate) fn apply_args(&mut self, args: &Args) {
        if let Some(addr) = args.listen_addr {
            self.listen_addr = addr;
        }
        if let Some(advertised) = &args.advertised_addr {
            self.advertised_addr = advertised.clone();
        }
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if !args.peers.is_empty() {
            self.peers = args.peers.clone();
        }
    }
}
