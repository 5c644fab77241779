//! Shared helpers for `logdb-paxos` integration tests.
//!
//! [`start_cluster`] builds an in-process cluster: every node gets its own
//! temp data directory and all nodes talk through one [`MemoryTransport`],
//! which lets tests take peers down or block single phases.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use logdb_paxos::{MemoryTransport, NodeContext, NodeSettings, PeerSet};
use logdb_storage::RecordStore;
use tempfile::TempDir;

pub struct TestCluster {
    pub nodes: Vec<Arc<NodeContext>>,
    pub addrs: Vec<String>,
    pub transport: Arc<MemoryTransport>,
    _dirs: Vec<TempDir>,
}

impl TestCluster {
    pub fn node(&self, i: usize) -> &Arc<NodeContext> {
        &self.nodes[i]
    }

    pub fn set_down(&self, i: usize, down: bool) {
        self.transport.set_down(&self.addrs[i], down);
    }
}

pub fn test_settings() -> NodeSettings {
    NodeSettings {
        append_attempts: 3,
        tail_wait: Duration::from_millis(500),
        index_poll: Duration::from_millis(50),
    }
}

/// Start `n` nodes named `node-<i>:7000`, all members of one peer set.
pub async fn start_cluster(n: usize) -> TestCluster {
    start_cluster_with(n, test_settings()).await
}

pub async fn start_cluster_with(n: usize, settings: NodeSettings) -> TestCluster {
    let addrs: Vec<String> = (0..n).map(|i| format!("node-{}:7000", i)).collect();
    let transport = MemoryTransport::new();
    let mut nodes = Vec::with_capacity(n);
    let mut dirs = Vec::with_capacity(n);

    for addr in &addrs {
        let tmp = TempDir::new().expect("create temp dir");
        let store = Arc::new(RecordStore::new(tmp.path()));
        let peers = PeerSet::new(addr.clone(), addrs.clone());
        let node = NodeContext::open(settings.clone(), peers, store, transport.clone())
            .await
            .expect("open node");
        transport.register(addr, &node);
        nodes.push(node);
        dirs.push(tmp);
    }

    TestCluster {
        nodes,
        addrs,
        transport,
        _dirs: dirs,
    }
}
