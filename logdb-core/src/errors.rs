use thiserror::Error;

use crate::outcome::RoundOutcome;

pub type Result<T> = std::result::Result<T, LogDbError>;

#[derive(Error, Debug)]
pub enum LogDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The fixed header of a record could not be parsed. Fatal for that path.
    #[error("corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid proposal number: {0:?}")]
    InvalidProposal(String),

    #[error("malformed record payload: {0}")]
    MalformedPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    /// A consensus round ended without the result the caller needed.
    #[error("round unresolved: {0}")]
    Unresolved(RoundOutcome),

    #[error("sequence allocation reached {got} of {need} required peers")]
    SequenceQuorum { got: usize, need: usize },

    /// The caller is not a member of the peer set.
    #[error("unauthorized peer: {0}")]
    Unauthorized(String),
}

impl LogDbError {
    /// True for failures that a client may retry as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            LogDbError::Unresolved(outcome) => outcome.is_retryable(),
            LogDbError::SequenceQuorum { .. } | LogDbError::Transport(_) => true,
            _ => false,
        }
    }
}
