use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{LogDbError, Result};

/// Width of every proposal number, and of each field in the record header.
pub const PROPOSAL_LEN: usize = 15;

/// Proposal number of a record that has never accepted anything.
pub const DEFAULT_SEQ: &str = "00000000-000000";

/// Proposal number marking a learned (frozen) record. Sorts above every real proposal.
pub const LEARNED_SEQ: &str = "99999999-999999";

/// A totally ordered proposal number.
///
/// Ordering is plain string ordering, so every token must be exactly
/// [`PROPOSAL_LEN`] characters. Real proposals are rendered as
/// `SSSSSSSSSSCCCNN`: unix seconds, a per-second counter and the node slot.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProposalSeq(String);

impl ProposalSeq {
    /// Accepts the two sentinels verbatim, or exactly [`PROPOSAL_LEN`] ASCII
    /// digits sorting strictly below [`LEARNED_SEQ`].
    pub fn parse(raw: &str) -> Result<Self> {
        let real = raw.len() == PROPOSAL_LEN
            && raw.bytes().all(|b| b.is_ascii_digit())
            && raw < LEARNED_SEQ;
        if !(real || raw == DEFAULT_SEQ || raw == LEARNED_SEQ) {
            return Err(LogDbError::InvalidProposal(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Build a real proposal number. `counter` must be below 1000 and `slot` below 100.
    pub fn from_parts(unix_secs: u64, counter: u16, slot: u8) -> Self {
        debug_assert!(counter < 1000 && slot < 100);
        Self(format!(
            "{:010}{:03}{:02}",
            unix_secs % 10_000_000_000,
            counter,
            slot
        ))
    }

    pub fn default_seq() -> Self {
        Self(DEFAULT_SEQ.to_string())
    }

    pub fn learned() -> Self {
        Self(LEARNED_SEQ.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SEQ
    }

    pub fn is_learned(&self) -> bool {
        self.0 == LEARNED_SEQ
    }

    /// Sentinels are never valid as a proposal sent by a proposer.
    pub fn is_sentinel(&self) -> bool {
        self.is_default() || self.is_learned()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProposalSeq {
    type Err = LogDbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProposalSeq {
    type Error = LogDbError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ProposalSeq> for String {
    fn from(seq: ProposalSeq) -> Self {
        seq.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_proposals_sort_between_sentinels() {
        let p = ProposalSeq::from_parts(1_760_000_000, 7, 3);
        assert_eq!(p.as_str(), "176000000000703");
        assert!(p > ProposalSeq::default_seq());
        assert!(p < ProposalSeq::learned());
        assert!(!p.is_sentinel());
    }

    #[test]
    fn ordering_follows_seconds_then_counter_then_slot() {
        let a = ProposalSeq::from_parts(1_760_000_000, 999, 99);
        let b = ProposalSeq::from_parts(1_760_000_001, 0, 0);
        assert!(a < b);
        let c = ProposalSeq::from_parts(1_760_000_001, 0, 1);
        assert!(b < c);
    }

    #[test]
    fn parse_rejects_wrong_width_and_garbage() {
        assert!(ProposalSeq::parse("176000000000703").is_ok());
        assert!(ProposalSeq::parse(DEFAULT_SEQ).is_ok());
        assert!(ProposalSeq::parse(LEARNED_SEQ).is_ok());
        assert!(ProposalSeq::parse("2023").is_err());
        assert!(ProposalSeq::parse("17600000000070x").is_err());
        assert!(ProposalSeq::parse("1760000\n0000703").is_err());
    }

    #[test]
    fn parse_rejects_tokens_at_or_above_learned() {
        // Dashed look-alikes of the sentinels.
        assert!(ProposalSeq::parse("99999999-999998").is_err());
        assert!(ProposalSeq::parse("20230407-101010").is_err());
        // All digits, but sorts above the learned sentinel.
        assert!(ProposalSeq::parse("999999999999999").is_err());
        assert!(ProposalSeq::parse("999999990000000").is_err());
        let top = ProposalSeq::parse("999999989999999").unwrap();
        assert!(top < ProposalSeq::learned());
    }

    #[test]
    fn serde_goes_through_validation() {
        let json = serde_json::to_string(&ProposalSeq::learned()).unwrap();
        assert_eq!(json, format!("\"{}\"", LEARNED_SEQ));
        let back: ProposalSeq = serde_json::from_str(&json).unwrap();
        assert!(back.is_learned());
        assert!(serde_json::from_str::<ProposalSeq>("\"short\"").is_err());
    }
}
