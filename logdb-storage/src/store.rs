use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use logdb_core::{paths, ProposalSeq};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::errors::{Result, StorageError};
use crate::record::{decode_header, encode_header, Record, HEADER_LEN};

// RecordStore keeps one file per slot path under its root:
// root/
//     log/
//         0/
//             1
//             2
//     kv/
//         ns/
//             key/
//                 1
//                 2

#[derive(Debug)]
pub struct RecordStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive access to one slot path. Released on drop.
pub struct PathGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the mutex once nobody else holds or waits on it.
        self.locks
            .remove_if(&self.key, |_, m| Arc::strong_count(m) == 1);
    }
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RecordStore {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        paths::validate(path).map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        Ok(self.root.join(path))
    }

    /// Serialize read-modify-write sequences on one path.
    pub async fn lock(&self, path: &str) -> PathGuard<'_> {
        let mutex = self
            .locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PathGuard {
            guard: Some(mutex.lock_owned().await),
            key: path.to_string(),
            locks: &self.locks,
        }
    }

    /// Read a record. `Ok(None)` when the path was never written.
    pub async fn read(&self, path: &str) -> Result<Option<Record>> {
        let file = self.resolve(path)?;
        let buf = match fs::read(&file).await {
            Ok(buf) => buf,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (promised, accepted) = decode_header(path, &buf).map_err(|e| {
            error!(path = %path, error = %e, "record header is corrupt");
            e
        })?;
        Ok(Some(Record {
            promised,
            accepted,
            value: buf[HEADER_LEN..].to_vec(),
        }))
    }

    /// Persist a new header, and optionally a new value.
    ///
    /// A missing file or a new value is written to a temp file and renamed
    /// over the destination. Otherwise only the header is overwritten in place.
    pub async fn update(
        &self,
        path: &str,
        promised: &ProposalSeq,
        accepted: &ProposalSeq,
        value: Option<&[u8]>,
    ) -> Result<()> {
        let target = self.resolve(path)?;
        let hdr = encode_header(promised, accepted);

        if value.is_some() || !fs::try_exists(&target).await? {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            let tmp = write_temp(&target, &hdr, value.unwrap_or_default()).await?;
            fs::rename(&tmp, &target).await.map_err(|e| {
                warn!(from = %tmp.display(), to = %target.display(), error = %e, "rename record failed");
                e
            })?;
            if let Some(parent) = target.parent() {
                sync_dir(parent).await?;
            }
        } else {
            let mut f = OpenOptions::new().write(true).open(&target).await?;
            f.write_all(&hdr).await?;
            f.sync_data().await?;
        }
        debug!(path = %path, promised = %promised, accepted = %accepted, "record updated");
        Ok(())
    }

    /// Highest version under `dir` whose file holds more than a bare header.
    ///
    /// Older version files in the same directory are removed once a newer
    /// one with a value is found. Only KV key directories qualify: log
    /// shards must never be pruned.
    pub async fn latest_learned_version(&self, dir: &str) -> Result<Option<u64>> {
        let in_kv = dir
            .strip_prefix(paths::KV_DIR)
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'));
        if !in_kv {
            return Err(StorageError::InvalidPath(format!(
                "{}: versions are only tracked under {}/",
                dir,
                paths::KV_DIR
            )));
        }
        let dir_path = self.resolve(dir)?;
        let mut versions = numeric_entries(&dir_path).await?;
        versions.sort_unstable_by(|a, b| b.cmp(a));

        for (i, version) in versions.iter().enumerate() {
            let meta = match fs::metadata(dir_path.join(version.to_string())).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if meta.len() as usize <= HEADER_LEN {
                continue;
            }
            for older in &versions[i + 1..] {
                let file = dir_path.join(older.to_string());
                match fs::remove_file(&file).await {
                    Ok(()) => debug!(path = %file.display(), "pruned old version"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %file.display(), error = %e, "prune failed"),
                }
            }
            return Ok(Some(*version));
        }
        Ok(None)
    }

    /// Highest log sequence number present on disk, 0 for an empty log.
    pub async fn max_log_seq(&self) -> Result<u64> {
        let log_dir = self.root.join(paths::LOG_DIR);
        let mut shards = numeric_entries(&log_dir).await?;
        shards.sort_unstable_by(|a, b| b.cmp(a));

        for shard in shards {
            let files = numeric_entries(&log_dir.join(shard.to_string())).await?;
            if let Some(max) = files.into_iter().max() {
                return Ok(max);
            }
        }
        Ok(0)
    }
}

/// Write header and value to `<target>-<uuid>.tmp` and flush it to disk.
async fn write_temp(target: &Path, hdr: &[u8], value: &[u8]) -> Result<PathBuf> {
    let mut name = target.as_os_str().to_owned();
    name.push(format!("-{}.tmp", uuid::Uuid::new_v4()));
    let tmp = PathBuf::from(name);

    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&tmp)
        .await?;
    f.write_all(hdr).await?;
    f.write_all(value).await?;
    f.sync_all().await?;
    Ok(tmp)
}

/// Flush a directory entry so a completed rename survives a crash.
async fn sync_dir(dir: &Path) -> Result<()> {
    let handle = fs::File::open(dir).await?;
    handle.sync_all().await?;
    Ok(())
}

/// Names in `dir` that parse as integers. A missing directory is empty.
async fn numeric_entries(dir: &Path) -> Result<Vec<u64>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
            out.push(n);
        }
    }
    Ok(out)
}
