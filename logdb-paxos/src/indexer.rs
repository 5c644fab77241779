//! Background task that walks the log in slot order and feeds the
//! [`LogIndex`](crate::index::LogIndex).
//!
//! A slot nobody has learned yet gets one poll interval of grace, since its
//! appender may still be mid-round. After that the indexer reads it with a
//! forcing round, which resolves slots left behind by crashed proposers.

use std::sync::Arc;

use logdb_core::payload;
use logdb_core::paths;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::node::NodeContext;

/// Spawn the log indexer for `node`. Runs until the task is aborted.
pub fn spawn_indexer(node: Arc<NodeContext>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll = node.settings().index_poll;
        let mut seq_changes = node.sequence().subscribe();
        let mut next = node.index().indexed_upto() + 1;
        let mut stalled: Option<(u64, Instant)> = None;

        info!(from = next, "log indexer started");
        loop {
            while next <= node.sequence().current() {
                let path = paths::log_path(next);

                let buf = match node.fetch(&path).await {
                    Ok(Some(buf)) => Some(buf),
                    Ok(None) => match stalled {
                        Some((seq, since)) if seq == next && since.elapsed() >= poll => {
                            match node.read(&path).await {
                                Ok(rec) => {
                                    node.index().insert(next, &rec.tags).await;
                                    next += 1;
                                    stalled = None;
                                    continue;
                                }
                                Err(e) => {
                                    warn!(seq = next, error = %e, "could not resolve log slot");
                                    None
                                }
                            }
                        }
                        Some((seq, _)) if seq == next => None,
                        _ => {
                            stalled = Some((next, Instant::now()));
                            None
                        }
                    },
                    Err(e) => {
                        warn!(seq = next, error = %e, "log slot fetch failed");
                        None
                    }
                };

                let Some(buf) = buf else { break };
                match payload::decode(&buf) {
                    Ok((tags, _)) => node.index().insert(next, &tags).await,
                    Err(e) => {
                        warn!(seq = next, error = %e, "unreadable log record, indexed as empty");
                        node.index().insert(next, &Default::default()).await;
                    }
                }
                debug!(seq = next, "indexed");
                next += 1;
                stalled = None;
            }

            // Caught up with what this node knows; ask the cluster for more.
            if next > node.sequence().current() {
                match node.cluster_max_seq().await {
                    Ok(max) if max >= next => continue,
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "sequence refresh failed"),
                }
            }

            tokio::select! {
                changed = seq_changes.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(poll) => {}
            }
        }
    })
}
