//! Slot paths.
//!
//! Log slots live at `log/<seq / 10000>/<seq>` and KV versions at
//! `kv/<namespace>/<key>/<version>`. Paths arrive from the network, so every
//! path is validated before it is joined onto a data directory.

use crate::errors::{LogDbError, Result};

pub const LOG_DIR: &str = "log";
pub const KV_DIR: &str = "kv";

/// Number of log slots per shard directory.
pub const SHARD_SIZE: u64 = 10_000;

pub fn log_path(seq: u64) -> String {
    format!("{}/{}/{}", LOG_DIR, seq / SHARD_SIZE, seq)
}

/// Directory holding every version of `key`. An empty namespace is skipped.
pub fn kv_dir(namespace: &str, key: &str) -> Result<String> {
    let key = key.trim_matches('/');
    let path = if namespace.is_empty() {
        format!("{}/{}", KV_DIR, key)
    } else {
        format!("{}/{}/{}", KV_DIR, namespace, key)
    };
    validate(&path)?;
    Ok(path)
}

pub fn kv_path(namespace: &str, key: &str, version: u64) -> Result<String> {
    Ok(format!("{}/{}", kv_dir(namespace, key)?, version))
}

/// Reject anything that could escape the data directory or collide with temp files.
pub fn validate(path: &str) -> Result<&str> {
    let invalid = |reason: &str| Err(LogDbError::InvalidPath(format!("{}: {}", path, reason)));

    if path.is_empty() {
        return invalid("empty");
    }
    if path.starts_with('/') {
        return invalid("absolute");
    }
    if path.contains(['\\', '\0', '?', '#', '%']) {
        return invalid("forbidden character");
    }
    for part in path.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return invalid("bad component");
        }
        if part.ends_with(".tmp") {
            return invalid("reserved suffix");
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_paths_are_sharded() {
        assert_eq!(log_path(0), "log/0/0");
        assert_eq!(log_path(9_999), "log/0/9999");
        assert_eq!(log_path(10_000), "log/1/10000");
        assert_eq!(log_path(123_456), "log/12/123456");
    }

    #[test]
    fn kv_paths() {
        assert_eq!(kv_path("ns", "key", 1).unwrap(), "kv/ns/key/1");
        assert_eq!(kv_path("", "/a/b/", 7).unwrap(), "kv/a/b/7");
        assert!(kv_path("ns", "../etc", 1).is_err());
        assert!(kv_path("ns", "", 1).is_err());
    }

    #[test]
    fn validate_rejects_escapes() {
        assert!(validate("log/0/1").is_ok());
        assert!(validate("/etc/passwd").is_err());
        assert!(validate("log//1").is_err());
        assert!(validate("log/./1").is_err());
        assert!(validate("log/0/1-abc.tmp").is_err());
        assert!(validate("").is_err());
        assert!(validate("kv/a?b/1").is_err());
    }
}
