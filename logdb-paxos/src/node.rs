//! One cluster node.
//!
//! [`NodeContext`] is built once at startup and shared by every request
//! handler. It owns the peer set, the transport, the local acceptor, the
//! proposer, the sequence counter and the log index, and implements the
//! cluster-wide write and read used by the KV store and the append log.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use logdb_core::payload::{self, Tags};
use logdb_core::{AcceptorReply, LogDbError, Phase, ProposalSeq, Result, RoundOutcome};
use logdb_storage::{RecordStore, HEADER_LEN};
use rand::seq::SliceRandom;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::acceptor::Acceptor;
use crate::append_log::AppendLog;
use crate::index::LogIndex;
use crate::kv::KvStore;
use crate::proposer::Proposer;
use crate::sequence::{SeqOp, SequenceAllocator};
use crate::transport::{fan_out, PeerSet, PeerTransport};

#[derive(Clone, Debug)]
pub struct NodeSettings {
    /// Attempts per append before giving up on conflicts.
    pub append_attempts: usize,
    /// Longest a tail or latest lookup waits for the index.
    pub tail_wait: Duration,
    /// Indexer wake-up interval when nothing changes locally.
    pub index_poll: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            append_attempts: 3,
            tail_wait: Duration::from_secs(15),
            index_poll: Duration::from_secs(1),
        }
    }
}

/// A learned record as returned to clients.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadRecord {
    pub tags: Tags,
    pub value: Vec<u8>,
    /// Size of the record on disk, header included.
    pub length: usize,
}

impl ReadRecord {
    fn from_payload(buf: Vec<u8>) -> Result<Self> {
        let length = HEADER_LEN + buf.len();
        let (tags, value) = payload::decode(&buf)?;
        Ok(Self { tags, value, length })
    }
}

pub struct NodeContext {
    settings: NodeSettings,
    peers: PeerSet,
    transport: Arc<dyn PeerTransport>,
    acceptor: Acceptor,
    proposer: Proposer,
    sequence: SequenceAllocator,
    index: LogIndex,
}

impl NodeContext {
    /// Build the node, recovering the sequence counter from the local log.
    pub async fn open(
        settings: NodeSettings,
        peers: PeerSet,
        store: Arc<RecordStore>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Arc<Self>> {
        let seq = store.max_log_seq().await?;
        info!(
            node = %peers.local(),
            peers = peers.len(),
            quorum = peers.quorum(),
            seq,
            data_dir = %store.root().display(),
            "node opened"
        );

        Ok(Arc::new(Self {
            proposer: Proposer::new(peers.clone(), transport.clone()),
            acceptor: Acceptor::new(store),
            sequence: SequenceAllocator::new(seq),
            index: LogIndex::new(),
            settings,
            peers,
            transport,
        }))
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    pub fn index(&self) -> &LogIndex {
        &self.index
    }

    pub fn proposer(&self) -> &Proposer {
        &self.proposer
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        self.acceptor.store()
    }

    pub fn kv(&self, namespace: &str) -> KvStore<'_> {
        KvStore::new(self, namespace)
    }

    pub fn log(&self) -> AppendLog<'_> {
        AppendLog::new(self)
    }

    // ===== RPC surface served to peers =====

    pub async fn serve_paxos(
        &self,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<AcceptorReply> {
        self.acceptor.handle(phase, proposal, path, body).await
    }

    pub fn serve_seq(&self, op: SeqOp) -> u64 {
        self.sequence.apply(op)
    }

    pub async fn serve_version(&self, dir: &str) -> Result<Option<u64>> {
        Ok(self.store().latest_learned_version(dir).await?)
    }

    // ===== cluster facade =====

    /// Commit `value` at `path` with `length` and `datetime` added to its tags.
    pub async fn write(&self, path: &str, mut tags: Tags, value: &[u8]) -> Result<RoundOutcome> {
        tags.insert("length".into(), json!(value.len()));
        tags.insert("datetime".into(), json!(datetime_stamp()));
        let buf = payload::encode(&tags, value)?;

        let outcome = self.proposer.propose(path, &buf).await;
        debug!(path = %path, %outcome, "cluster write");
        Ok(outcome)
    }

    /// Learned value at `path` from this node or any peer, without forcing.
    pub async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        if let Some(buf) = self.acceptor.fetch(path).await? {
            return Ok(Some(buf));
        }
        self.fetch_from_peers(path).await
    }

    /// Read the learned record at `path`.
    ///
    /// When no node has learned it yet, an empty round is run to drive the
    /// slot to a terminal state. That round completes any value a crashed
    /// proposer left accepted, or else commits an empty placeholder.
    pub async fn read(&self, path: &str) -> Result<ReadRecord> {
        for attempt in 0..2 {
            if let Some(buf) = self.fetch(path).await? {
                return ReadRecord::from_payload(buf);
            }
            if attempt == 0 {
                let outcome = self.proposer.propose(path, b"").await;
                info!(path = %path, %outcome, "forced unresolved slot");
                if let RoundOutcome::QuorumFailed(_) = outcome {
                    return Err(LogDbError::Unresolved(outcome));
                }
            }
        }
        Err(LogDbError::Unresolved(RoundOutcome::QuorumFailed(Phase::Fetch)))
    }

    async fn fetch_from_peers(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let mut remotes: Vec<&str> = self.peers.remotes().collect();
        remotes.shuffle(&mut rand::rng());

        let default = ProposalSeq::default_seq();
        for peer in remotes {
            match self
                .transport
                .paxos(peer, Phase::Fetch, &default, path, None)
                .await
            {
                Ok(AcceptorReply::Value(buf)) => {
                    self.acceptor.install_learned(path, &buf).await?;
                    debug!(path = %path, peer = %peer, "learned value copied from peer");
                    return Ok(Some(buf));
                }
                Ok(_) => {}
                Err(e) => debug!(path = %path, peer = %peer, error = %e, "fetch failed"),
            }
        }
        Ok(None)
    }

    // ===== sequence and version lookups =====

    /// Allocate a log slot number: increment on every peer, take the highest.
    pub async fn allocate_seq(&self) -> Result<u64> {
        let seq = self.collect_seq(SeqOp::Next).await?;
        self.sequence.observe(seq);
        Ok(seq)
    }

    /// Highest sequence number known to a quorum of peers.
    pub async fn cluster_max_seq(&self) -> Result<u64> {
        let seq = self.collect_seq(SeqOp::Max).await?;
        self.sequence.observe(seq);
        Ok(seq)
    }

    async fn collect_seq(&self, op: SeqOp) -> Result<u64> {
        let replies = fan_out(&self.peers, |peer| self.transport.seq(peer, op)).await;
        let values = self.successes(replies, op.as_str());
        let need = self.peers.quorum();
        if values.len() < need {
            warn!(op = %op, got = values.len(), need, "sequence quorum not reached");
            return Err(LogDbError::SequenceQuorum {
                got: values.len(),
                need,
            });
        }
        Ok(values.into_iter().max().unwrap_or(0))
    }

    /// Highest version under `dir` that any of a quorum of peers has learned.
    pub async fn latest_version(&self, dir: &str) -> Result<Option<u64>> {
        let replies = fan_out(&self.peers, |peer| self.transport.version(peer, dir)).await;
        let versions = self.successes(replies, "version");
        if versions.len() < self.peers.quorum() {
            return Err(LogDbError::Unresolved(RoundOutcome::QuorumFailed(
                Phase::Fetch,
            )));
        }
        Ok(versions.into_iter().flatten().max())
    }

    fn successes<T>(&self, replies: Vec<(&str, Result<T>)>, call: &str) -> Vec<T> {
        replies
            .into_iter()
            .filter_map(|(peer, res)| match res {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(peer = %peer, call, error = %e, "peer call failed");
                    None
                }
            })
            .collect()
    }
}

/// Current UTC time as the integer `YYYYMMDDHHMMSS`.
fn datetime_stamp() -> u64 {
    let now = Utc::now();
    let date = now.year().max(0) as u64 * 10_000 + now.month() as u64 * 100 + now.day() as u64;
    let time = now.hour() as u64 * 10_000 + now.minute() as u64 * 100 + now.second() as u64;
    date * 1_000_000 + time
}
