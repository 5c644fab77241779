//! In-memory index over learned log slots.
//!
//! Built by the background indexer in slot order and rebuilt from the log
//! after a restart. Two lookups are served:
//! - `(reader, channel)` to the ordered set of slots addressed to it (tail)
//! - `(writer, reader, channel)` to the newest slot written for it (latest)

use std::collections::{BTreeSet, HashMap};

use logdb_core::payload::tag_str;
use logdb_core::Tags;
use tokio::sync::{watch, RwLock};

type ChannelKey = (String, String);
type WriterKey = (String, String, String);

#[derive(Default, Debug)]
struct IndexState {
    channels: HashMap<ChannelKey, BTreeSet<u64>>,
    latest: HashMap<WriterKey, u64>,
}

#[derive(Debug)]
pub struct LogIndex {
    state: RwLock<IndexState>,
    progress: watch::Sender<u64>,
}

impl Default for LogIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LogIndex {
    pub fn new() -> Self {
        let (progress, _rx) = watch::channel(0);
        Self {
            state: RwLock::new(IndexState::default()),
            progress,
        }
    }

    /// Record slot `seq`. Slots must be inserted in increasing order.
    ///
    /// Slots without tags (placeholders committed by a forcing round) only
    /// advance the progress marker.
    pub async fn insert(&self, seq: u64, tags: &Tags) {
        if !tags.is_empty() {
            let reader = tag_str(tags, "reader").to_string();
            let channel = tag_str(tags, "channel").to_string();
            let writer = tag_str(tags, "writer").to_string();

            let mut state = self.state.write().await;
            state
                .channels
                .entry((reader.clone(), channel.clone()))
                .or_default()
                .insert(seq);
            state.latest.insert((writer, reader, channel), seq);
        }
        self.progress.send_if_modified(|upto| {
            if seq > *upto {
                *upto = seq;
                true
            } else {
                false
            }
        });
    }

    /// First slot at or after `from` in the `(reader, channel)` stream.
    pub async fn next_in_channel(&self, from: u64, reader: &str, channel: &str) -> Option<u64> {
        let state = self.state.read().await;
        state
            .channels
            .get(&(reader.to_string(), channel.to_string()))
            .and_then(|seqs| seqs.range(from..).next().copied())
    }

    pub async fn latest(&self, writer: &str, reader: &str, channel: &str) -> Option<u64> {
        let key = (writer.to_string(), reader.to_string(), channel.to_string());
        self.state.read().await.latest.get(&key).copied()
    }

    /// Highest slot indexed so far. Every slot below it is indexed too.
    pub fn indexed_upto(&self) -> u64 {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.progress.subscribe()
    }
}
