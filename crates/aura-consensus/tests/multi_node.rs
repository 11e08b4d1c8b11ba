//! Exercises small in-process clusters wired through an in-memory
//! transport stub (an outbound sink that fans packets out to whichever
//! peer `read()`s them next). Timer-driven promotion is covered by the
//! unit tests in `node.rs`; these integration tests instead drive the
//! vote exchange directly so quorum behavior across several peers is
//! deterministic and race-free.

use std::sync::{Arc, Mutex};

use aura_consensus::{NodeConfig, Packet, PacketData, PacketKind, RaftNode, Role, StaticMembership};

fn make_node(id: &str, cluster_size: usize, outbox: Arc<Mutex<Vec<Packet>>>) -> RaftNode {
    let mut node = RaftNode::new(
        NodeConfig::default().with_id(id),
        Arc::new(StaticMembership(cluster_size)),
    )
    .unwrap();
    node.set_outbound_sink(move |packet| {
        outbox.lock().unwrap().push(packet);
        true
    });
    node
}

#[test]
fn three_node_cluster_elects_a_single_leader_via_manual_vote_exchange() {
    let size = 3;
    let outbox_a = Arc::new(Mutex::new(Vec::new()));
    let outbox_b = Arc::new(Mutex::new(Vec::new()));
    let outbox_c = Arc::new(Mutex::new(Vec::new()));

    let mut a = make_node("a", size, outbox_a.clone());
    let mut b = make_node("b", size, outbox_b.clone());
    let mut c = make_node("c", size, outbox_c.clone());

    // `a` times out first (in practice via its heartbeat watchdog) and
    // starts a campaign.
    a.promote();
    assert_eq!(a.role(), Role::Candidate);
    assert_eq!(a.term(), 1);
    assert_eq!(a.votes_granted(), 1);

    let solicitation = outbox_a
        .lock()
        .unwrap()
        .pop()
        .expect("promote() broadcasts a vote solicitation");
    assert_eq!(solicitation.kind, PacketKind::Vote);

    // Deliver the solicitation to both peers.
    assert!(b.read(solicitation.clone()));
    assert!(c.read(solicitation));
    assert_eq!(b.voted_for(), Some("a"));
    assert_eq!(c.voted_for(), Some("a"));

    let reply_from_b = outbox_b.lock().unwrap().pop().unwrap();
    let reply_from_c = outbox_c.lock().unwrap().pop().unwrap();
    assert_eq!(reply_from_b.kind, PacketKind::Voted);
    assert_eq!(reply_from_c.kind, PacketKind::Voted);

    // quorum = floor(3/2) + 1 = 2. The self-vote plus one external grant
    // already clears it.
    assert!(a.read(reply_from_b));
    assert_eq!(a.role(), Role::Leader);
    assert_eq!(a.leader(), Some("a"));

    // The late-arriving second vote is a no-op; `a` already won.
    assert!(a.read(reply_from_c));
    assert_eq!(a.role(), Role::Leader);
    assert_eq!(a.votes_granted(), 2);

    // Once `a` heartbeats, both followers recognize it as leader.
    assert!(a.broadcast(
        PacketKind::Heartbeat,
        PacketData::Heartbeat { duration_ms: None }
    ));
    let hb = outbox_a.lock().unwrap().pop().unwrap();
    assert!(b.read(hb.clone()));
    assert!(c.read(hb));
    assert_eq!(b.leader(), Some("a"));
    assert_eq!(c.leader(), Some("a"));
    assert_eq!(b.role(), Role::Follower);
    assert_eq!(c.role(), Role::Follower);
}

#[test]
fn five_node_cluster_requires_two_external_votes_for_quorum() {
    let size = 5;
    let outboxes: Vec<_> = (0..5).map(|_| Arc::new(Mutex::new(Vec::new()))).collect();
    let names = ["a", "b", "c", "d", "e"];
    let mut nodes: Vec<RaftNode> = names
        .iter()
        .zip(outboxes.iter())
        .map(|(name, outbox)| make_node(name, size, outbox.clone()))
        .collect();

    nodes[0].promote();
    assert_eq!(nodes[0].term(), 1);
    assert_eq!(nodes[0].votes_granted(), 1);

    let solicitation = outboxes[0].lock().unwrap().pop().unwrap();

    // Deliver to every peer; collect their Voted replies.
    let mut replies = Vec::new();
    for (node, outbox) in nodes.iter_mut().zip(outboxes.iter()).skip(1) {
        assert!(node.read(solicitation.clone()));
        replies.push(outbox.lock().unwrap().pop().unwrap());
    }
    assert_eq!(replies.len(), 4);

    // quorum = floor(5/2) + 1 = 3. Self-vote (1) + one grant (2) is not
    // yet enough.
    assert!(nodes[0].read(replies[0].clone()));
    assert_eq!(nodes[0].role(), Role::Candidate);
    assert_eq!(nodes[0].votes_granted(), 2);

    // The second grant reaches quorum.
    assert!(nodes[0].read(replies[1].clone()));
    assert_eq!(nodes[0].role(), Role::Leader);
    assert_eq!(nodes[0].leader(), Some("a"));
    assert_eq!(nodes[0].votes_granted(), 3);
}

#[test]
fn duplicate_solicitations_in_the_same_term_get_at_most_one_grant() {
    let size = 3;
    let outbox_b = Arc::new(Mutex::new(Vec::new()));
    let mut b = make_node("b", size, outbox_b.clone());

    let vote_from_a = Packet::new(
        Role::Candidate,
        1,
        "a",
        PacketKind::Vote,
        PacketData::Vote {
            last_log_index: 0,
            last_log_term: 0,
        },
    );
    let vote_from_c = Packet::new(
        Role::Candidate,
        1,
        "c",
        PacketKind::Vote,
        PacketData::Vote {
            last_log_index: 0,
            last_log_term: 0,
        },
    );

    assert!(b.read(vote_from_a));
    let first_reply = outbox_b.lock().unwrap().pop().unwrap();
    assert!(matches!(
        first_reply.data,
        PacketData::Voted { granted: true }
    ));

    assert!(b.read(vote_from_c));
    let second_reply = outbox_b.lock().unwrap().pop().unwrap();
    assert!(matches!(
        second_reply.data,
        PacketData::Voted { granted: false }
    ));

    assert_eq!(b.voted_for(), Some("a"));
}
