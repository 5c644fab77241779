//! Acceptor replies as they travel between nodes.

use serde::{Deserialize, Serialize};

use crate::proposal::ProposalSeq;

/// A value an acceptor accepted in an earlier round, reported during `promise`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PriorAccept {
    pub seq: ProposalSeq,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum AcceptorReply {
    /// Promise granted. `prior` is set when this acceptor already accepted a value.
    Promised { prior: Option<PriorAccept> },
    /// `accept` or `learn` applied.
    Ack,
    /// `fetch` on a learned record.
    Value(#[serde(with = "base64_bytes")] Vec<u8>),
    /// `fetch` on a record that is not learned yet.
    NotLearned,
    /// The record is frozen; nothing was changed.
    AlreadyLearned,
    /// The phase precondition did not hold.
    Rejected,
}

/// Record bytes travel as one base64 string rather than a JSON number array.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
