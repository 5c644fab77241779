//! Acceptor and learner.
//!
//! Serves the four phases for one path against the local [`RecordStore`].
//! Each call holds the path lock for its whole read-modify-write.
//!
//! ```text
//! promise(n): n >  promised            -> promised = n, report prior accept
//! accept(n):  n == promised            -> accepted = n, store value
//! learn(n):   n == promised == accepted -> both = LEARNED (frozen)
//! fetch:      learned                  -> value
//! ```
//!
//! A learned record answers every phase but `fetch` with `AlreadyLearned`.

use std::sync::Arc;

use logdb_core::{AcceptorReply, Phase, PriorAccept, ProposalSeq, Result};
use logdb_storage::{Record, RecordStore};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Acceptor {
    store: Arc<RecordStore>,
}

impl Acceptor {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub async fn handle(
        &self,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<AcceptorReply> {
        let _guard = self.store.lock(path).await;
        let record = self.store.read(path).await?.unwrap_or_else(Record::empty);

        if record.is_learned() {
            return Ok(match phase {
                Phase::Fetch => AcceptorReply::Value(record.value),
                _ => AcceptorReply::AlreadyLearned,
            });
        }

        let reply = match phase {
            Phase::Fetch => AcceptorReply::NotLearned,
            _ if proposal.is_sentinel() => AcceptorReply::Rejected,
            Phase::Promise if *proposal > record.promised => {
                self.store
                    .update(path, proposal, &record.accepted, None)
                    .await?;
                let prior = (!record.accepted.is_default()).then(|| PriorAccept {
                    seq: record.accepted,
                    value: record.value,
                });
                AcceptorReply::Promised { prior }
            }
            Phase::Accept if *proposal == record.promised => {
                self.store
                    .update(path, proposal, proposal, Some(body.unwrap_or_default()))
                    .await?;
                AcceptorReply::Ack
            }
            Phase::Learn if *proposal == record.promised && *proposal == record.accepted => {
                let learned = ProposalSeq::learned();
                self.store.update(path, &learned, &learned, None).await?;
                AcceptorReply::Ack
            }
            _ => AcceptorReply::Rejected,
        };

        debug!(path = %path, %phase, %proposal, reply = reply_name(&reply), "acceptor");
        Ok(reply)
    }

    /// Read a learned value, `None` if this node has not learned the path.
    pub async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self
            .handle(Phase::Fetch, &ProposalSeq::default_seq(), path, None)
            .await?
        {
            AcceptorReply::Value(v) => Ok(Some(v)),
            _ => Ok(None),
        }
    }

    /// Store a value another node already learned.
    pub async fn install_learned(&self, path: &str, value: &[u8]) -> Result<()> {
        let _guard = self.store.lock(path).await;
        if let Some(rec) = self.store.read(path).await? {
            if rec.is_learned() {
                return Ok(());
            }
        }
        let learned = ProposalSeq::learned();
        self.store
            .update(path, &learned, &learned, Some(value))
            .await?;
        Ok(())
    }
}

fn reply_name(reply: &AcceptorReply) -> &'static str {
    match reply {
        AcceptorReply::Promised { prior: None } => "promised",
        AcceptorReply::Promised { prior: Some(_) } => "promised-with-prior",
        AcceptorReply::Ack => "ack",
        AcceptorReply::Value(_) => "value",
        AcceptorReply::NotLearned => "not-learned",
        AcceptorReply::AlreadyLearned => "already-learned",
        AcceptorReply::Rejected => "rejected",
    }
}
