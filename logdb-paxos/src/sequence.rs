//! Node-local log sequence counter.
//!
//! Allocation is optimistic: two nodes can hand out the same number. The slot
//! itself is claimed by a full Paxos round, so a collision surfaces as a
//! `Conflict` for one of the writers, which then retries with a new number.

use std::fmt;
use std::str::FromStr;

use logdb_core::LogDbError;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqOp {
    /// Increment and return.
    Next,
    /// Return the current value.
    Max,
}

impl SeqOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeqOp::Next => "next",
            SeqOp::Max => "max",
        }
    }
}

impl fmt::Display for SeqOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeqOp {
    type Err = LogDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(SeqOp::Next),
            "max" => Ok(SeqOp::Max),
            other => Err(LogDbError::InvalidPath(format!("unknown seq op: {}", other))),
        }
    }
}

/// Monotonic counter whose changes can be awaited through [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct SequenceAllocator {
    tx: watch::Sender<u64>,
}

impl SequenceAllocator {
    pub fn new(initial: u64) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn next(&self) -> u64 {
        let mut out = 0;
        self.tx.send_modify(|v| {
            *v += 1;
            out = *v;
        });
        out
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Raise the counter to `seen` if it is behind. Returns true when it moved.
    pub fn observe(&self, seen: u64) -> bool {
        self.tx.send_if_modified(|v| {
            if seen > *v {
                *v = seen;
                true
            } else {
                false
            }
        })
    }

    pub fn apply(&self, op: SeqOp) -> u64 {
        match op {
            SeqOp::Next => self.next(),
            SeqOp::Max => self.current(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments_from_initial() {
        let seq = SequenceAllocator::new(41);
        assert_eq!(seq.next(), 42);
        assert_eq!(seq.apply(SeqOp::Next), 43);
        assert_eq!(seq.apply(SeqOp::Max), 43);
    }

    #[test]
    fn observe_only_moves_forward() {
        let seq = SequenceAllocator::new(10);
        assert!(!seq.observe(5));
        assert_eq!(seq.current(), 10);
        assert!(seq.observe(12));
        assert_eq!(seq.current(), 12);
    }

    #[tokio::test]
    async fn subscribers_see_increments() {
        let seq = SequenceAllocator::new(0);
        let mut rx = seq.subscribe();
        seq.next();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn op_names() {
        assert_eq!("next".parse::<SeqOp>().unwrap(), SeqOp::Next);
        assert_eq!(SeqOp::Max.to_string(), "max");
        assert!("prev".parse::<SeqOp>().is_err());
    }
}
