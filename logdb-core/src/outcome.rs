use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LogDbError;

/// The four phases an acceptor serves.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Promise,
    Accept,
    Learn,
    Fetch,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Promise => "promise",
            Phase::Accept => "accept",
            Phase::Learn => "learn",
            Phase::Fetch => "fetch",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = LogDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promise" => Ok(Phase::Promise),
            "accept" => Ok(Phase::Accept),
            "learn" => Ok(Phase::Learn),
            "fetch" => Ok(Phase::Fetch),
            other => Err(LogDbError::InvalidPath(format!("unknown phase: {}", other))),
        }
    }
}

/// Terminal result of one proposer round.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Our value was chosen and learned.
    Committed,
    /// A previously accepted value won the slot instead of ours.
    Conflict,
    /// The slot was already frozen by an earlier round.
    AlreadyLearned,
    /// Fewer than a quorum of acceptors answered the given phase.
    QuorumFailed(Phase),
}

impl RoundOutcome {
    /// Status string used on the wire (`x-status` header).
    pub fn status(&self) -> &'static str {
        match self {
            RoundOutcome::Committed => "OK",
            RoundOutcome::Conflict => "CONFLICT",
            RoundOutcome::AlreadyLearned => "ALREADY_LEARNED",
            RoundOutcome::QuorumFailed(Phase::Promise) => "NO_PROMISE_QUORUM",
            RoundOutcome::QuorumFailed(Phase::Accept) => "NO_ACCEPT_QUORUM",
            RoundOutcome::QuorumFailed(Phase::Learn) => "NO_LEARN_QUORUM",
            RoundOutcome::QuorumFailed(Phase::Fetch) => "NO_FETCH_QUORUM",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RoundOutcome::QuorumFailed(_))
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}
