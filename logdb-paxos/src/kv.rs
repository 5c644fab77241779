//! Versioned key-value store.
//!
//! Every `(key, version)` pair is its own write-once slot at
//! `kv/<namespace>/<key>/<version>`. Writers pick version numbers; the
//! latest version is the highest one any quorum member has learned.

use logdb_core::{paths, Result, RoundOutcome, Tags};

use crate::node::{NodeContext, ReadRecord};

pub struct KvStore<'a> {
    node: &'a NodeContext,
    namespace: String,
}

impl<'a> KvStore<'a> {
    pub fn new(node: &'a NodeContext, namespace: &str) -> Self {
        Self {
            node,
            namespace: namespace.to_string(),
        }
    }

    pub async fn put(&self, key: &str, version: u64, value: &[u8]) -> Result<RoundOutcome> {
        let path = paths::kv_path(&self.namespace, key, version)?;
        self.node.write(&path, Tags::new(), value).await
    }

    pub async fn get(&self, key: &str, version: u64) -> Result<ReadRecord> {
        let path = paths::kv_path(&self.namespace, key, version)?;
        self.node.read(&path).await
    }

    /// Newest learned version of `key`, `None` if it was never written.
    pub async fn latest(&self, key: &str) -> Result<Option<(u64, ReadRecord)>> {
        let dir = paths::kv_dir(&self.namespace, key)?;
        match self.node.latest_version(&dir).await? {
            Some(version) => Ok(Some((version, self.get(key, version).await?))),
            None => Ok(None),
        }
    }
}
