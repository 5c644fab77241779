//! `logdb-paxos`: single-decree Paxos over a static peer set.
//!
//! Every slot (`log/<shard>/<seq>` or `kv/<ns>/<key>/<version>`) is decided by
//! its own independent round. A proposer runs promise, accept and learn
//! against all peers and needs a majority for the first two; `learn` freezes
//! the record so later rounds short-circuit with `AlreadyLearned`.
//!
//! [`NodeContext`] ties one node together: it serves the acceptor and
//! sequence RPCs for its peers and offers the cluster-wide write/read facade
//! used by the versioned KV store and the append-only log.

pub mod acceptor;
pub mod append_log;
pub mod clock;
pub mod index;
pub mod indexer;
pub mod kv;
pub mod node;
pub mod proposer;
pub mod sequence;
pub mod transport;

pub use acceptor::Acceptor;
pub use append_log::AppendLog;
pub use index::LogIndex;
pub use indexer::spawn_indexer;
pub use kv::KvStore;
pub use node::{NodeContext, NodeSettings, ReadRecord};
pub use proposer::Proposer;
pub use sequence::{SeqOp, SequenceAllocator};
pub use transport::{HttpTransport, HttpTransportConfig, MemoryTransport, PeerSet, PeerTransport};
