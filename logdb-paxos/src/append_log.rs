//! Append-only log.
//!
//! Slot numbers come from the optimistic sequence counter, so two appenders
//! may pick the same slot. The Paxos round on `log/<shard>/<seq>` decides
//! which one owns it and the loser retries with a fresh number.

use logdb_core::{paths, LogDbError, Result, RoundOutcome, Tags};
use serde_json::json;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::node::{NodeContext, ReadRecord};

pub struct AppendLog<'a> {
    node: &'a NodeContext,
}

impl<'a> AppendLog<'a> {
    pub fn new(node: &'a NodeContext) -> Self {
        Self { node }
    }

    /// Append a record and return its slot number.
    ///
    /// `writer` is the caller's identity when known. It is stored as the
    /// `writer` tag and is the default `reader`.
    pub async fn append(&self, writer: Option<&str>, mut tags: Tags, body: &[u8]) -> Result<u64> {
        if let Some(writer) = writer {
            tags.insert("writer".into(), json!(writer));
        }
        if !tags.contains_key("reader") {
            if let Some(writer) = tags.get("writer").cloned() {
                tags.insert("reader".into(), writer);
            }
        }

        let mut last = RoundOutcome::Conflict;
        for attempt in 1..=self.node.settings().append_attempts.max(1) {
            let seq = self.node.allocate_seq().await?;
            let path = paths::log_path(seq);
            last = self.node.write(&path, tags.clone(), body).await?;
            match last {
                RoundOutcome::Committed => {
                    debug!(seq, attempt, "appended");
                    return Ok(seq);
                }
                RoundOutcome::Conflict | RoundOutcome::AlreadyLearned => {
                    warn!(seq, attempt, outcome = %last, "slot taken, retrying append");
                }
                RoundOutcome::QuorumFailed(_) => break,
            }
        }
        Err(LogDbError::Unresolved(last))
    }

    /// First record at or after `from` addressed to `(reader, channel)`.
    ///
    /// Waits for the indexer up to the configured tail wait and returns
    /// `None` if nothing arrives in time.
    pub async fn tail(
        &self,
        from: u64,
        reader: &str,
        channel: &str,
    ) -> Result<Option<(u64, ReadRecord)>> {
        let index = self.node.index();
        let deadline = Instant::now() + self.node.settings().tail_wait;
        let mut progress = index.subscribe();

        loop {
            if let Some(seq) = index.next_in_channel(from, reader, channel).await {
                let rec = self.node.read(&paths::log_path(seq)).await?;
                return Ok(Some((seq, rec)));
            }
            match timeout_at(deadline, progress.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(None),
            }
        }
    }

    /// Newest record written by `writer` for `(reader, channel)`.
    ///
    /// Waits, up to the tail wait, for the index to catch up with the
    /// cluster sequence so the answer is not stale.
    pub async fn latest(
        &self,
        writer: &str,
        reader: &str,
        channel: &str,
    ) -> Result<Option<(u64, ReadRecord)>> {
        let index = self.node.index();
        let target = self.node.cluster_max_seq().await?;
        let deadline = Instant::now() + self.node.settings().tail_wait;
        let mut progress = index.subscribe();

        while index.indexed_upto() < target {
            match timeout_at(deadline, progress.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    warn!(target, indexed = index.indexed_upto(), "index behind cluster sequence");
                    break;
                }
            }
        }

        match index.latest(writer, reader, channel).await {
            Some(seq) => Ok(Some((seq, self.node.read(&paths::log_path(seq)).await?))),
            None => Ok(None),
        }
    }
}
