mod args_parse;
mod node_server;
mod peer_tls;
mod service_configuration;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use logdb_paxos::transport::TlsMaterial;
use logdb_paxos::{spawn_indexer, HttpTransport, HttpTransportConfig, NodeContext, PeerSet};
use logdb_storage::RecordStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args_parse::Args;
use crate::peer_tls::PeerIdentityAcceptor;
use crate::service_configuration::{LoadConfiguration, ServiceConfiguration, TlsConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config_content = fs::read_to_string(&args.config_file)
        .with_context(|| format!("reading {}", args.config_file.display()))?;
    let load_config: LoadConfiguration = serde_yaml::from_str(&config_content)?;
    let mut service_config: ServiceConfiguration = load_config.try_into()?;
    service_config.apply_args(&args);

    fs::create_dir_all(&service_config.data_dir)
        .with_context(|| format!("creating {}", service_config.data_dir.display()))?;

    let transport = HttpTransport::new(HttpTransportConfig {
        timeout: service_config.rpc_timeout,
        tls: service_config.tls.as_ref().map(load_tls).transpose()?,
    })?;

    let peers = PeerSet::new(
        service_config.advertised_addr.clone(),
        service_config.peers.clone(),
    );
    let store = Arc::new(RecordStore::new(&service_config.data_dir));
    let node = NodeContext::open(service_config.node.clone(), peers, store, Arc::new(transport))
        .await
        .context("opening node")?;

    let _indexer = spawn_indexer(node.clone());
    let app = node_server::router(node);
    let addr = service_config.listen_addr;

    match &service_config.tls {
        Some(tls) => {
            let acceptor = PeerIdentityAcceptor::new(peer_tls::server_config(tls)?);
            info!("LogDB node listening on https://{} (client certificates required)", addr);
            axum_server::bind(addr)
                .acceptor(acceptor)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("LogDB node listening on http://{}", addr);
            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }
    }

    Ok(())
}

fn load_tls(tls: &TlsConfig) -> Result<TlsMaterial> {
    let ca_pem = fs::read(&tls.ca).with_context(|| format!("reading {}", tls.ca.display()))?;
    let mut identity_pem =
        fs::read(&tls.cert).with_context(|| format!("reading {}", tls.cert.display()))?;
    identity_pem.push(b'\n');
    identity_pem.extend(fs::read(&tls.key).with_context(|| format!("reading {}", tls.key.display()))?);
    Ok(TlsMaterial { ca_pem, identity_pem })
}
