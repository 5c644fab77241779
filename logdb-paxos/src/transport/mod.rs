//! Peer transport.
//!
//! [`PeerTransport`] is the client side of the node-to-node RPC surface.
//! [`HttpTransport`] talks to real peers; [`MemoryTransport`] routes calls to
//! in-process nodes and is used to run whole clusters in tests.

use std::future::Future;

use async_trait::async_trait;
use futures::future::join_all;
use logdb_core::{AcceptorReply, Phase, ProposalSeq, Result};

use crate::sequence::SeqOp;

mod http;
pub use http::{HttpTransport, HttpTransportConfig, TlsMaterial};

mod memory;
pub use memory::MemoryTransport;

#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Run one acceptor phase on `peer`. `body` is only sent for `accept`.
    async fn paxos(
        &self,
        peer: &str,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<AcceptorReply>;

    /// Read (`Max`) or increment (`Next`) the peer's sequence counter.
    async fn seq(&self, peer: &str, op: SeqOp) -> Result<u64>;

    /// Highest version under a KV directory that holds a value on `peer`.
    async fn version(&self, peer: &str, dir: &str) -> Result<Option<u64>>;
}

/// Static cluster membership. Always contains the local node.
#[derive(Clone, Debug)]
pub struct PeerSet {
    local: String,
    peers: Vec<String>,
}

impl PeerSet {
    pub fn new(local: impl Into<String>, peers: impl IntoIterator<Item = String>) -> Self {
        let local = local.into();
        let mut peers: Vec<String> = peers.into_iter().collect();
        peers.push(local.clone());
        peers.sort();
        peers.dedup();
        Self { local, peers }
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Majority of the configured peers: `floor(n / 2) + 1`.
    pub fn quorum(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.peers.iter().any(|p| p == peer)
    }

    pub fn remotes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(move |p| *p != self.local)
    }

    /// Position of the local node in the sorted peer list.
    pub fn slot(&self) -> u8 {
        let idx = self.peers.iter().position(|p| *p == self.local).unwrap_or(0);
        (idx % 100) as u8
    }
}

/// Issue `call` to every peer concurrently and pair each result with its peer.
pub async fn fan_out<'a, T, F, Fut>(peers: &'a PeerSet, call: F) -> Vec<(&'a str, Result<T>)>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    join_all(peers.iter().map(|peer| {
        let fut = call(peer);
        async move { (peer, fut.await) }
    }))
    .await
}
