use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "logdb-server", about = "LogDB replicated log and KV node")]
pub(crate) struct Args {
    /// Path to the YAML config file
    #[arg(long)]
    pub(crate) config_file: PathBuf,

    /// Address to listen on (overrides node.host / node.port)
    #[arg(long)]
    pub(crate) listen_addr: Option<SocketAddr>,

    /// Identity of this node in the peer list (overrides node.advertised_addr)
    #[arg(long)]
    pub(crate) advertised_addr: Option<String>,

    /// Data directory (overrides data_dir)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,

    /// Cluster member, repeatable (replaces the configured peers)
    #[arg(long = "peer")]
    pub(crate) peers: Vec<String>,
}
