//! Proposer side of a single-decree round.

use std::sync::Arc;

use logdb_core::{AcceptorReply, Phase, PriorAccept, ProposalSeq, RoundOutcome};
use tracing::{debug, warn};

use crate::clock::ProposalClock;
use crate::transport::{fan_out, PeerSet, PeerTransport};

/// Drives promise, accept and learn for one path across the peer set.
///
/// There is no retry inside a round; a `QuorumFailed` outcome is safe to
/// retry with the next proposal number, which the clock hands out anyway.
pub struct Proposer {
    peers: PeerSet,
    transport: Arc<dyn PeerTransport>,
    clock: ProposalClock,
}

impl Proposer {
    pub fn new(peers: PeerSet, transport: Arc<dyn PeerTransport>) -> Self {
        let clock = ProposalClock::new(peers.slot());
        Self {
            peers,
            transport,
            clock,
        }
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub async fn propose(&self, path: &str, value: &[u8]) -> RoundOutcome {
        let quorum = self.peers.quorum();
        let proposal = self.clock.next();

        // Phase 1: promise
        let replies = self.broadcast(Phase::Promise, &proposal, path, None).await;
        let mut granted = 0;
        let mut learned = false;
        let mut prior: Option<PriorAccept> = None;
        for reply in replies {
            match reply {
                AcceptorReply::Promised { prior: p } => {
                    granted += 1;
                    if let Some(p) = p {
                        if prior.as_ref().map_or(true, |cur| p.seq > cur.seq) {
                            prior = Some(p);
                        }
                    }
                }
                AcceptorReply::AlreadyLearned => {
                    granted += 1;
                    learned = true;
                }
                _ => {}
            }
        }
        if granted < quorum {
            warn!(path = %path, %proposal, granted, quorum, "promise quorum not reached");
            return RoundOutcome::QuorumFailed(Phase::Promise);
        }
        if learned {
            debug!(path = %path, %proposal, "slot already learned");
            return RoundOutcome::AlreadyLearned;
        }

        // A value accepted in an earlier round must be carried forward.
        let chosen = prior.map(|p| p.value);
        let chosen_value = chosen.as_deref().unwrap_or(value);

        // Phase 2: accept
        let replies = self
            .broadcast(Phase::Accept, &proposal, path, Some(chosen_value))
            .await;
        let acked = replies
            .iter()
            .filter(|r| matches!(r, AcceptorReply::Ack))
            .count();
        if acked < quorum {
            warn!(path = %path, %proposal, acked, quorum, "accept quorum not reached");
            return RoundOutcome::QuorumFailed(Phase::Accept);
        }

        // Phase 3: learn. Missing learns are completed by later readers.
        let learned = self
            .broadcast(Phase::Learn, &proposal, path, None)
            .await
            .iter()
            .filter(|r| matches!(r, AcceptorReply::Ack))
            .count();
        debug!(path = %path, %proposal, learned, peers = self.peers.len(), "round learned");

        // Carrying a prior forward completes someone else's round, even when
        // the bytes happen to match ours.
        if chosen.is_some() {
            RoundOutcome::Conflict
        } else {
            RoundOutcome::Committed
        }
    }

    /// Successful replies only; transport failures are logged and dropped.
    async fn broadcast(
        &self,
        phase: Phase,
        proposal: &ProposalSeq,
        path: &str,
        body: Option<&[u8]>,
    ) -> Vec<AcceptorReply> {
        fan_out(&self.peers, |peer| {
            self.transport.paxos(peer, phase, proposal, path, body)
        })
        .await
        .into_iter()
        .filter_map(|(peer, res)| match res {
            Ok(reply) => Some(reply),
            Err(e) => {
                debug!(peer = %peer, %phase, path = %path, error = %e, "peer call failed");
                None
            }
        })
        .collect()
    }
}
