//! # Consensus Tests
//!
//! Multi-node rounds over the in-memory transport:
//!
//! - quorum thresholds for promise and accept
//! - the prior-accept rule when two proposers race on one slot
//! - forcing rounds on reads of unresolved slots
//! - learned values spreading to nodes that missed the round

mod common;

use logdb_core::{AcceptorReply, Phase, ProposalSeq, RoundOutcome, Tags};

/// **What**: A one-node cluster commits and fetches a raw value.
///
/// **Checks**: quorum is 1, the round commits, `fetch` returns the exact bytes.
#[tokio::test]
async fn single_node_commits_hello() {
    let cluster = common::start_cluster(1).await;
    let node = cluster.node(0);
    assert_eq!(node.peers().quorum(), 1);

    let outcome = node.proposer().propose("log/0/0", b"hello").await;
    assert_eq!(outcome, RoundOutcome::Committed);

    let reply = node
        .serve_paxos(Phase::Fetch, &ProposalSeq::default_seq(), "log/0/0", None)
        .await
        .unwrap();
    assert_eq!(reply, AcceptorReply::Value(b"hello".to_vec()));
}

/// **What**: Quorum math on a five-node cluster.
///
/// **Checks**: two reachable acceptors fail the promise phase, three succeed.
#[tokio::test]
async fn five_nodes_need_three_acceptors() {
    let cluster = common::start_cluster(5).await;
    let node = cluster.node(0);
    assert_eq!(node.peers().quorum(), 3);

    for i in 2..5 {
        cluster.set_down(i, true);
    }
    let outcome = node.write("log/0/1", Tags::new(), b"v").await.unwrap();
    assert_eq!(outcome, RoundOutcome::QuorumFailed(Phase::Promise));
    assert_eq!(outcome.status(), "NO_PROMISE_QUORUM");

    cluster.set_down(2, false);
    let outcome = node.write("log/0/2", Tags::new(), b"v").await.unwrap();
    assert_eq!(outcome, RoundOutcome::Committed);
}

/// **What**: Accept quorum failure is reported separately from promise.
#[tokio::test]
async fn blocked_accepts_fail_the_round() {
    let cluster = common::start_cluster(3).await;
    cluster.transport.block_phase(&cluster.addrs[1], Phase::Accept);
    cluster.transport.block_phase(&cluster.addrs[2], Phase::Accept);

    let outcome = cluster.node(0).write("log/0/1", Tags::new(), b"v").await.unwrap();
    assert_eq!(outcome, RoundOutcome::QuorumFailed(Phase::Accept));
    assert_eq!(outcome.status(), "NO_ACCEPT_QUORUM");
}

/// **What**: Two proposers race on `kv/ns/key/1` with `A` and `B`.
///
/// **Why**: The first round is accepted everywhere but its learn never
/// arrives, so the second proposer must discover `A` during promise and
/// carry it forward instead of writing `B`.
///
/// **Checks**: one `OK`, one `CONFLICT`, and every node reads `A`.
#[tokio::test]
async fn racing_proposers_agree_on_first_accepted_value() {
    let cluster = common::start_cluster(3).await;
    for addr in &cluster.addrs {
        cluster.transport.block_phase(addr, Phase::Learn);
    }

    let first = cluster.node(0).kv("ns").put("key", 1, b"A").await.unwrap();
    assert_eq!(first, RoundOutcome::Committed);

    cluster.transport.unblock_all();
    let second = cluster.node(1).kv("ns").put("key", 1, b"B").await.unwrap();
    assert_eq!(second, RoundOutcome::Conflict);
    assert_eq!(second.status(), "CONFLICT");

    for node in &cluster.nodes {
        let rec = node.kv("ns").get("key", 1).await.unwrap();
        assert_eq!(rec.value, b"A");
    }
}

/// **What**: Two proposers send byte-identical values to one slot.
///
/// **Why**: The second round only finishes the first one. Its caller did
/// not win the slot, whatever bytes it carried.
///
/// **Checks**: the first round is `OK`, the second is `CONFLICT`.
#[tokio::test]
async fn adopting_an_identical_prior_is_still_a_conflict() {
    let cluster = common::start_cluster(3).await;
    for addr in &cluster.addrs {
        cluster.transport.block_phase(addr, Phase::Learn);
    }
    let path = "log/0/21";

    let first = cluster.node(0).proposer().propose(path, b"same").await;
    assert_eq!(first, RoundOutcome::Committed);

    let second = cluster.node(1).proposer().propose(path, b"same").await;
    assert_eq!(second, RoundOutcome::Conflict);
    assert_eq!(second.status(), "CONFLICT");
}

/// **What**: Once learned, a slot answers later rounds with `ALREADY_LEARNED`.
#[tokio::test]
async fn learned_slot_short_circuits() {
    let cluster = common::start_cluster(3).await;
    let path = "log/0/5";

    let first = cluster.node(0).write(path, Tags::new(), b"one").await.unwrap();
    assert_eq!(first, RoundOutcome::Committed);

    let again = cluster.node(2).write(path, Tags::new(), b"two").await.unwrap();
    assert_eq!(again, RoundOutcome::AlreadyLearned);
    assert_eq!(cluster.node(2).read(path).await.unwrap().value, b"one");
}

/// **What**: Many proposers on every node write the same slot at once.
///
/// **Checks**: at most one reports `OK`, and every node reads the same value,
/// which is the committed one when there is one.
#[tokio::test]
async fn concurrent_writers_never_split_a_slot() {
    let cluster = common::start_cluster(3).await;
    let path = "log/0/7";

    let writes = (0..9).map(|i| {
        let node = cluster.node(i % 3).clone();
        let body = format!("value-{}", i).into_bytes();
        async move {
            let outcome = node.write(path, Tags::new(), &body).await.unwrap();
            (outcome, body)
        }
    });
    let results = futures::future::join_all(writes).await;

    let committed: Vec<&Vec<u8>> = results
        .iter()
        .filter(|(o, _)| *o == RoundOutcome::Committed)
        .map(|(_, b)| b)
        .collect();
    assert!(committed.len() <= 1, "more than one writer committed");

    let mut reads = Vec::new();
    for node in &cluster.nodes {
        reads.push(node.read(path).await.unwrap().value);
    }
    assert!(reads.windows(2).all(|w| w[0] == w[1]));
    if let Some(winner) = committed.first() {
        assert_eq!(&reads[0], *winner);
    }
}

/// **What**: Reading a path nobody wrote forces an empty round.
///
/// **Checks**: the result is `(tags = {}, value = b"", length = 32)` and the
/// placeholder is learned, so a later write reports `ALREADY_LEARNED`.
#[tokio::test]
async fn read_of_unwritten_path_commits_placeholder() {
    let cluster = common::start_cluster(3).await;
    let rec = cluster.node(1).read("log/0/42").await.unwrap();
    assert!(rec.tags.is_empty());
    assert!(rec.value.is_empty());
    assert_eq!(rec.length, 32);

    let outcome = cluster.node(0).write("log/0/42", Tags::new(), b"late").await.unwrap();
    assert_eq!(outcome, RoundOutcome::AlreadyLearned);
}

/// **What**: A value accepted by a single node, whose proposer then died,
/// is completed by the next reader instead of being replaced.
#[tokio::test]
async fn forcing_round_completes_stranded_accept() {
    let cluster = common::start_cluster(3).await;
    cluster.transport.block_phase(&cluster.addrs[1], Phase::Accept);
    cluster.transport.block_phase(&cluster.addrs[2], Phase::Accept);

    let outcome = cluster.node(0).write("log/0/9", Tags::new(), b"stranded").await.unwrap();
    assert_eq!(outcome, RoundOutcome::QuorumFailed(Phase::Accept));

    cluster.transport.unblock_all();
    let rec = cluster.node(2).read("log/0/9").await.unwrap();
    assert_eq!(rec.value, b"stranded");
    assert_eq!(rec.tags.get("length").and_then(|v| v.as_u64()), Some(8));
}

/// **What**: A node that was down during a round picks up the learned value
/// from a peer on its first read and keeps a local copy.
#[tokio::test]
async fn lagging_node_copies_learned_value() {
    let cluster = common::start_cluster(3).await;
    cluster.set_down(2, true);
    let outcome = cluster.node(0).write("log/0/3", Tags::new(), b"x").await.unwrap();
    assert_eq!(outcome, RoundOutcome::Committed);
    cluster.set_down(2, false);

    let lagging = cluster.node(2);
    assert!(lagging.store().read("log/0/3").await.unwrap().is_none());

    let rec = lagging.read("log/0/3").await.unwrap();
    assert_eq!(rec.value, b"x");
    assert!(lagging.store().read("log/0/3").await.unwrap().unwrap().is_learned());
}

/// **What**: A read with no quorum reachable reports the failed phase.
#[tokio::test]
async fn read_without_quorum_is_unresolved() {
    let cluster = common::start_cluster(3).await;
    cluster.set_down(1, true);
    cluster.set_down(2, true);

    let err = cluster.node(0).read("log/0/11").await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        logdb_core::LogDbError::Unresolved(RoundOutcome::QuorumFailed(Phase::Promise))
    ));
}
