//! HTTP peer transport.
//!
//! Every RPC is a `POST` to the peer's node server. Replies are JSON encoded;
//! the `accept` body carries the raw value bytes.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use logdb_core::{AcceptorReply, LogDbError, Phase, ProposalSeq, Result};
use tracing::{info, warn};

use super::PeerTransport;
use crate::sequence::SeqOp;

/// PEM material for talking to peers over TLS.
#[derive(Clone)]
pub struct TlsMaterial {
    /// CA bundle used to verify peers.
    pub ca_pem: Vec<u8>,
    /// Client certificate followed by its private key.
    pub identity_pem: Vec<u8>,
}

#[derive(Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub tls: Option<TlsMaterial>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            tls: None,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    scheme: &'static str,
    /// Last known reachability per peer, so transitions are logged once
    /// instead of on every failed RPC.
    reachable: DashMap<String, bool>,
}

impl HttpTransport {
    pub fn new(cfg: HttpTransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .pool_max_idle_per_host(64);
        let mut scheme = "http";

        if let Some(tls) = cfg.tls {
            let ca = reqwest::Certificate::from_pem(&tls.ca_pem).map_err(transport_err)?;
            let identity =
                reqwest::Identity::from_pem(&tls.identity_pem).map_err(transport_err)?;
            builder = builder
                .use_rustls_tls()
                .tls_built_in_root_certs(false)
                .add_root_certificate(ca)
                .identity(identity);
            scheme = "https";
        }

        Ok(Self {
            client: builder.build().map_err(transport_err)?,
            scheme,
            reachable: DashMap::new(),
        })
    }

    async fn post(&self, peer: &str, route: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let url = format!("{}://{}/{}", self.scheme, peer, route);
        let resp = match self.client.post(&url).body(body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.mark_failure(peer, &e);
                return Err(transport_err(e));
            }
        };
        self.mark_success(peer);

        let status = resp.status();
        if !status.is_success() {
            return Err(LogDbError::Transport(format!(
                "{} answered {} for {}",
                peer, status, route
            )));
        }
        let bytes = resp.bytes().await.map_err(transport_err)?;
        Ok(bytes.to_vec())
    }

    fn mark_success(&self, peer: &str) {
        if self.reachable.insert(peer.to_string(), true) != Some(true) {
            info!(peer = %peer, "peer is reachable");
        }
    }

    fn mark_failure(&self, peer: &str, err: &reqwest::Error) {
        if self.reachable.insert(peer.to_string(), false) != Some(false) {
            warn!(peer = %peer, error = %err, "peer became unreachable");
        }
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn paxos(
        &self,
        peer: &str,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<AcceptorReply> {
        let route = format!("paxos/{}/{}/{}", phase, proposal, path);
        let raw = self
            .post(peer, &route, body.map(<[u8]>::to_vec).unwrap_or_default())
            .await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn seq(&self, peer: &str, op: SeqOp) -> Result<u64> {
        let raw = self
            .post(peer, &format!("seq/{}", op.as_str()), Vec::new())
            .await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn version(&self, peer: &str, dir: &str) -> Result<Option<u64>> {
        let raw = self
            .post(peer, &format!("version/{}", dir), Vec::new())
            .await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

fn transport_err(e: reqwest::Error) -> LogDbError {
    LogDbError::Transport(e.to_string())
}
