use logdb_core::LogDbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl From<StorageError> for LogDbError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => LogDbError::Io(e),
            StorageError::CorruptRecord { path, reason } => {
                LogDbError::CorruptRecord { path, reason }
            }
            StorageError::InvalidPath(p) => LogDbError::InvalidPath(p),
        }
    }
}
