//! Proposal number generation.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use logdb_core::ProposalSeq;

const COUNTER_LIMIT: u16 = 1000;

/// Hands out strictly increasing proposal numbers for one node.
///
/// Numbers are `(unix seconds, counter, slot)`. Several proposals in the same
/// second bump the counter; a counter overflow or a clock step backwards
/// borrows from the next second, so the sequence never repeats. The node slot
/// keeps numbers from different nodes apart.
#[derive(Debug)]
pub struct ProposalClock {
    slot: u8,
    last: Mutex<(u64, u16)>,
}

impl ProposalClock {
    pub fn new(slot: u8) -> Self {
        Self {
            slot: slot % 100,
            last: Mutex::new((0, 0)),
        }
    }

    pub fn next(&self) -> ProposalSeq {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.next_at(now)
    }

    fn next_at(&self, now: u64) -> ProposalSeq {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let (secs, counter) = if now > last.0 {
            (now, 0)
        } else if last.1 + 1 < COUNTER_LIMIT {
            (last.0, last.1 + 1)
        } else {
            (last.0 + 1, 0)
        };
        *last = (secs, counter);
        ProposalSeq::from_parts(secs, counter, self.slot)
    }
}
