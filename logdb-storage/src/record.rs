use logdb_core::{ProposalSeq, PROPOSAL_LEN};

use crate::errors::{Result, StorageError};

/// Size of the on-disk header: two proposal numbers, each followed by `\n`.
pub const HEADER_LEN: usize = 2 * (PROPOSAL_LEN + 1);

/// One slot as stored by an acceptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub promised: ProposalSeq,
    pub accepted: ProposalSeq,
    pub value: Vec<u8>,
}

impl Record {
    /// A record nobody has touched yet.
    pub fn empty() -> Self {
        Self {
            promised: ProposalSeq::default_seq(),
            accepted: ProposalSeq::default_seq(),
            value: Vec::new(),
        }
    }

    /// Learned records are frozen: both numbers hold the learned sentinel.
    pub fn is_learned(&self) -> bool {
        self.promised.is_learned() && self.accepted.is_learned()
    }

    /// Header plus value, i.e. the file size.
    pub fn total_len(&self) -> u64 {
        (HEADER_LEN + self.value.len()) as u64
    }
}

pub fn encode_header(promised: &ProposalSeq, accepted: &ProposalSeq) -> [u8; HEADER_LEN] {
    let mut hdr = [b' '; HEADER_LEN];
    write_field(&mut hdr[..PROPOSAL_LEN + 1], promised);
    write_field(&mut hdr[PROPOSAL_LEN + 1..], accepted);
    hdr
}

// Fields are padded with spaces if ever shorter than PROPOSAL_LEN.
fn write_field(slot: &mut [u8], seq: &ProposalSeq) {
    let raw = seq.as_str().as_bytes();
    let n = raw.len().min(PROPOSAL_LEN);
    slot[..n].copy_from_slice(&raw[..n]);
    slot[PROPOSAL_LEN] = b'\n';
}

/// Parse the fixed header. `path` is only used for the error message.
pub fn decode_header(path: &str, buf: &[u8]) -> Result<(ProposalSeq, ProposalSeq)> {
    let corrupt = |reason: String| StorageError::CorruptRecord {
        path: path.to_string(),
        reason,
    };

    if buf.len() < HEADER_LEN {
        return Err(corrupt(format!("header is {} bytes", buf.len())));
    }
    let mut seqs = Vec::with_capacity(2);
    for field in buf[..HEADER_LEN].chunks(PROPOSAL_LEN + 1) {
        if field[PROPOSAL_LEN] != b'\n' {
            return Err(corrupt("missing field terminator".to_string()));
        }
        let text = std::str::from_utf8(&field[..PROPOSAL_LEN])
            .map_err(|e| corrupt(format!("header is not ascii: {}", e)))?;
        let seq = ProposalSeq::parse(text.trim())
            .map_err(|_| corrupt(format!("bad proposal number {:?}", text)))?;
        seqs.push(seq);
    }
    let accepted = seqs.pop().ok_or_else(|| corrupt("missing field".to_string()))?;
    let promised = seqs.pop().ok_or_else(|| corrupt("missing field".to_string()))?;
    Ok((promised, accepted))
}
