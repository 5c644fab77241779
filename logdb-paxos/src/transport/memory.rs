//! In-process transport.
//!
//! Routes RPCs straight to registered [`NodeContext`]s. Peers can be taken
//! down, or single phases blocked on a peer, to reproduce partial failures.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use logdb_core::{AcceptorReply, LogDbError, Phase, ProposalSeq, Result};

use super::PeerTransport;
use crate::node::NodeContext;
use crate::sequence::SeqOp;

#[derive(Default)]
pub struct MemoryTransport {
    nodes: DashMap<String, Weak<NodeContext>>,
    down: DashSet<String>,
    blocked: DashSet<(String, Phase)>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, addr: &str, node: &Arc<NodeContext>) {
        self.nodes.insert(addr.to_string(), Arc::downgrade(node));
    }

    /// Make every call to `addr` fail (or succeed again).
    pub fn set_down(&self, addr: &str, down: bool) {
        if down {
            self.down.insert(addr.to_string());
        } else {
            self.down.remove(addr);
        }
    }

    /// Make calls for one paxos phase on `addr` fail.
    pub fn block_phase(&self, addr: &str, phase: Phase) {
        self.blocked.insert((addr.to_string(), phase));
    }

    pub fn unblock_all(&self) {
        self.blocked.clear();
    }

    fn node(&self, peer: &str) -> Result<Arc<NodeContext>> {
        if self.down.contains(peer) {
            return Err(LogDbError::Transport(format!("{} is down", peer)));
        }
        self.nodes
            .get(peer)
            .and_then(|n| n.upgrade())
            .ok_or_else(|| LogDbError::Transport(format!("{} is not registered", peer)))
    }
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn paxos(
        &self,
        peer: &str,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<AcceptorReply> {
        if self.blocked.contains(&(peer.to_string(), phase)) {
            return Err(LogDbError::Transport(format!("{} blocked on {}", peer, phase)));
        }
        let node = self.node(peer)?;
        node.serve_paxos(phase, proposal, path, body).await
    }

    async fn seq(&self, peer: &str, op: SeqOp) -> Result<u64> {
        Ok(self.node(peer)?.serve_seq(op))
    }

    async fn version(&self, peer: &str, dir: &str) -> Result<Option<u64>> {
        self.node(peer)?.serve_version(dir).await
    }
}
