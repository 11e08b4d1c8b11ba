use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{NodeConfig, TimeoutRange};
use crate::error::ConsensusError;
use crate::event::{EventBus, NodeEvent};
use crate::membership::ClusterMembership;
use crate::packet::{Packet, PacketData, PacketKind};
use crate::timeout::timeout;
use crate::timer::{TimerName, TimerRegistry};

/// A node's role in the cluster. `Stopped` is internal bookkeeping for
/// this implementation — the Raft paper itself never defines a fourth
/// state, but without one `end()` would have nowhere to park a node that
/// must reject every further operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
    Stopped,
}

/// Hook a transport registers to actually put a packet on the wire.
/// Returns whether the packet was admitted to the transport — the core
/// never learns whether it was delivered.
pub type OutboundSink = Box<dyn Fn(Packet) -> bool + Send + Sync>;

/// Partial update over `(term, leader, role)`. Fields left `None` are
/// untouched; fields present are compared against the current value and,
/// if different, applied and announced on the event bus — in the order
/// term, then leader, then role.
#[derive(Default)]
struct Delta {
    term: Option<u64>,
    leader: Option<Option<String>>,
    role: Option<Role>,
}

/// The per-node Raft state machine: role, term, leader, and vote record,
/// plus the timers and event bus that drive and announce transitions.
pub struct RaftNode {
    name: String,
    term: u64,
    role: Role,
    leader: Option<String>,
    voted_for: Option<String>,
    votes_granted: u64,

    threshold: f64,
    election_range: TimeoutRange,
    heartbeat_range: TimeoutRange,

    membership: Arc<dyn ClusterMembership>,
    timers: TimerRegistry,
    timer_rx: tokio::sync::mpsc::UnboundedReceiver<TimerName>,
    events: EventBus,
    outbound: Option<OutboundSink>,
}

impl RaftNode {
    /// Constructs a node in the initial `Follower` state with `term = 0`
    /// and no known leader, and arms its heartbeat watchdog.
    pub fn new(config: NodeConfig, membership: Arc<dyn ClusterMembership>) -> Result<Self, ConsensusError> {
        let election_range = config.election_range()?;
        let heartbeat_range = config.heartbeat_range()?;
        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(ConsensusError::InvalidThreshold {
                value: config.threshold,
            });
        }

        let name = config.id.clone().unwrap_or_else(generate_node_id);
        let (timers, timer_rx) = TimerRegistry::new();

        let mut node = Self {
            name,
            term: 0,
            role: Role::Follower,
            leader: None,
            voted_for: None,
            votes_granted: 0,
            threshold: config.threshold,
            election_range,
            heartbeat_range,
            membership,
            timers,
            timer_rx,
            events: EventBus::new(),
            outbound: None,
        };
        node.heartbeat(None);
        Ok(node)
    }

    /// Convenience constructor: default timeouts, a single-node cluster.
    /// Most useful for tests and for an isolated node awaiting a transport.
    pub fn with_defaults(id: impl Into<String>) -> Self {
        Self::new(
            NodeConfig::default().with_id(id),
            Arc::new(crate::membership::StaticMembership(1)),
        )
        .expect("default config is always valid")
    }

    // --- Observable state -------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn leader(&self) -> Option<&str> {
        self.leader.as_deref()
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.voted_for.as_deref()
    }

    pub fn votes_granted(&self) -> u64 {
        self.votes_granted
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Subscribes to this node's lifecycle events (`term change`,
    /// `state change`, `leader change`, `heartbeat timeout`, `vote`,
    /// `data`). This is the seam a transport attaches to.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Registers the sink a transport uses to actually send packets this
    /// node constructs via `write`/`broadcast`.
    pub fn set_outbound_sink(&mut self, sink: impl Fn(Packet) -> bool + Send + Sync + 'static) {
        self.outbound = Some(Box::new(sink));
    }

    // --- Public operations --------------------------------------------

    /// Ingests an inbound packet, applying Rules A–D in order. Returns
    /// `false` only if the node has already been stopped.
    pub fn read(&mut self, packet: Packet) -> bool {
        if self.role == Role::Stopped {
            return false;
        }

        self.events.emit(NodeEvent::Data {
            packet: packet.clone(),
        });

        // Rule A: term reconciliation (Raft §5.1).
        if packet.term > self.term {
            self.change(Delta {
                term: Some(packet.term),
                role: Some(Role::Follower),
                ..Default::default()
            });
        } else if packet.term < self.term {
            // Stale sender: drop, no further processing.
            debug!(
                sender = %packet.name,
                sender_term = packet.term,
                self_term = self.term,
                "dropping stale-term packet"
            );
            return true;
        }

        // Rule B: leader recognition (Raft §5.2). Also used to learn the
        // current leader's name — the distilled rule only says "become a
        // follower"; without also recording the sender, `leader()` could
        // never reflect reality for anyone but the leader itself.
        if packet.state == Role::Leader {
            if self.role != Role::Follower {
                self.change(Delta {
                    role: Some(Role::Follower),
                    ..Default::default()
                });
            }
            self.change(Delta {
                leader: Some(Some(packet.name.clone())),
                ..Default::default()
            });
        }

        // Rule C: kind dispatch.
        match packet.kind {
            PacketKind::Heartbeat => self.handle_heartbeat(&packet),
            PacketKind::Vote => self.handle_vote(&packet),
            PacketKind::Voted => self.handle_voted(&packet),
            PacketKind::Rpc => {
                // Reserved for future client-command dispatch.
            }
        }

        true
    }

    /// Hands a packet to the transport's outbound sink. Returns `false`
    /// if the node is stopped or no sink has been registered yet.
    pub fn write(&mut self, packet: Packet) -> bool {
        if self.role == Role::Stopped {
            return false;
        }
        match &self.outbound {
            Some(sink) => sink(packet),
            None => false,
        }
    }

    /// Constructs an envelope from this node's current state and hands
    /// it to the outbound sink once — the transport is responsible for
    /// fanning it out to every peer.
    pub fn broadcast(&mut self, kind: PacketKind, data: PacketData) -> bool {
        let packet = self.packet(kind, data);
        self.write(packet)
    }

    /// Arms or adjusts the heartbeat watchdog. A `Candidate` has no
    /// heartbeat watchdog of its own — its watchdog is the `election`
    /// timer armed by `promote()` — so this is a no-op while campaigning
    /// or after `end()`.
    pub fn heartbeat(&mut self, duration_ms: Option<u64>) {
        if matches!(self.role, Role::Candidate | Role::Stopped) {
            return;
        }
        let duration = duration_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| timeout(self.heartbeat_range));
        self.arm(TimerName::Heartbeat, duration);
    }

    /// Transitions `Follower`/`Candidate` into a fresh campaign: bumps
    /// the term, votes for itself, broadcasts a vote solicitation, and
    /// (unless a single-node cluster lets it win immediately) arms an
    /// election timer for split-vote recovery.
    pub fn promote(&mut self) {
        if self.role == Role::Stopped {
            return;
        }

        info!(name = %self.name, new_term = self.term + 1, "election timeout elapsed, becoming candidate");

        self.change(Delta {
            term: Some(self.term + 1),
            leader: Some(Some(String::new())),
            role: Some(Role::Candidate),
        });

        self.voted_for = Some(self.name.clone());
        self.votes_granted = 1;

        self.broadcast(
            PacketKind::Vote,
            PacketData::Vote {
                last_log_index: 0,
                last_log_term: 0,
            },
        );

        self.try_become_leader();

        if self.role == Role::Candidate {
            let duration = timeout(self.election_range);
            self.arm(TimerName::Election, duration);
        }
    }

    /// Cancels all timers, unregisters all event listeners, and marks
    /// the node `Stopped`. Returns `false` if it was already stopped.
    pub fn end(&mut self) -> bool {
        if self.role == Role::Stopped {
            return false;
        }
        info!(name = %self.name, "stopping node");
        self.timers.end();
        self.role = Role::Stopped;
        self.outbound = None;
        // Dropping the old bus closes every existing subscriber's
        // channel, which is how "unregister all listeners" is realized
        // without a per-subscriber unregister call.
        self.events = EventBus::new();
        true
    }

    /// Awaits the next timer expiry and applies its effect. Returns
    /// `false` once the node is stopped (callers should stop looping).
    /// Intended to be raced in a `tokio::select!` alongside whatever
    /// channel feeds `read()`.
    pub async fn tick(&mut self) -> bool {
        if self.role == Role::Stopped {
            return false;
        }
        match self.timer_rx.recv().await {
            Some(name) => {
                self.timers.clear_one(name);
                self.dispatch_timer(name);
                true
            }
            None => false,
        }
    }

    // --- Internal rule implementation ----------------------------------

    fn handle_heartbeat(&mut self, packet: &Packet) {
        if packet.state != Role::Leader {
            return;
        }
        let duration_ms = match &packet.data {
            PacketData::Heartbeat { duration_ms } => *duration_ms,
            _ => None,
        };
        self.heartbeat(duration_ms);
    }

    fn handle_vote(&mut self, packet: &Packet) {
        let granted = if packet.term < self.term {
            false
        } else {
            if packet.term > self.term {
                self.change(Delta {
                    term: Some(packet.term),
                    ..Default::default()
                });
            }
            match &self.voted_for {
                Some(existing) if existing != &packet.name => false,
                _ => {
                    self.voted_for = Some(packet.name.clone());
                    true
                }
            }
        };

        debug!(candidate = %packet.name, term = packet.term, granted, "cast vote");

        self.events.emit(NodeEvent::Vote {
            packet: packet.clone(),
            granted,
        });

        let response = self.packet(PacketKind::Voted, PacketData::Voted { granted });
        self.write(response);
    }

    fn handle_voted(&mut self, packet: &Packet) {
        if self.role != Role::Candidate {
            return;
        }
        if let PacketData::Voted { granted } = &packet.data {
            if *granted && packet.term == self.term {
                self.votes_granted += 1;
            }
        }
        // Vestigial under the current rule ordering: Rule A already
        // reconciles any higher term (and demotes away from Candidate)
        // before Rule C runs. Kept for fidelity with the documented step.
        if packet.term > self.term {
            self.change(Delta {
                term: Some(packet.term),
                ..Default::default()
            });
        }
        self.try_become_leader();
    }

    fn try_become_leader(&mut self) {
        if self.role == Role::Candidate && self.votes_granted >= self.quorum() {
            info!(
                name = %self.name,
                term = self.term,
                votes = self.votes_granted,
                quorum = self.quorum(),
                "quorum reached, becoming leader"
            );
            self.change(Delta {
                leader: Some(Some(self.name.clone())),
                role: Some(Role::Leader),
                ..Default::default()
            });
        }
    }

    fn dispatch_timer(&mut self, name: TimerName) {
        match name {
            TimerName::Heartbeat => {
                if self.role == Role::Leader {
                    self.broadcast(PacketKind::Heartbeat, PacketData::Heartbeat { duration_ms: None });
                    self.heartbeat(None);
                } else {
                    warn!(name = %self.name, term = self.term, "heartbeat timeout, no leader recognized");
                    self.events.emit(NodeEvent::HeartbeatTimeout);
                    self.promote();
                }
            }
            TimerName::Election => {
                // Split-vote recovery: start a fresh term.
                warn!(name = %self.name, term = self.term, "election timed out with no quorum, restarting campaign");
                self.promote();
            }
        }
    }

    /// Applies a partial update, emitting one event per changed field in
    /// `(term, leader, role)` order, and running each field's derived
    /// reaction synchronously before returning.
    fn change(&mut self, delta: Delta) {
        if let Some(new_term) = delta.term {
            if new_term != self.term {
                let old = self.term;
                self.term = new_term;
                self.events.emit(NodeEvent::TermChange { new: new_term, old });
                // I2: a term change always clears the vote record.
                self.voted_for = None;
                self.votes_granted = 0;
            }
        }

        if let Some(new_leader) = delta.leader {
            if new_leader != self.leader {
                let old = self.leader.clone();
                self.leader = new_leader.clone();
                self.events.emit(NodeEvent::LeaderChange {
                    new: new_leader,
                    old,
                });
            }
        }

        if let Some(new_role) = delta.role {
            if new_role != self.role {
                let old = self.role;
                self.role = new_role;
                debug!(name = %self.name, ?old, new = ?new_role, "role transition");
                self.events.emit(NodeEvent::StateChange { new: new_role, old });
                // A role change always clears every timer before
                // scheduling its next one (I4).
                self.timers.clear();
                self.heartbeat(None);
            }
        }
    }

    fn arm(&mut self, name: TimerName, duration: Duration) {
        if self.timers.active(name) {
            // Cannot fail: we just confirmed a timer by this name is live.
            self.timers
                .adjust(name, duration)
                .expect("timer was just confirmed active");
        } else {
            // Cannot fail: we just confirmed no timer by this name is live.
            self.timers
                .set(name, duration)
                .expect("timer was just confirmed inactive");
        }
    }

    fn packet(&self, kind: PacketKind, data: PacketData) -> Packet {
        Packet::new(self.role, self.term, self.name.clone(), kind, data)
    }

    fn quorum(&self) -> u64 {
        // Canonical Raft quorum is floor(N/2) + 1. The original
        // ceil(N/2) + 1 formula over-counts by one for an even-sized
        // cluster; canonical Raft is used here instead (see DESIGN.md).
        (self.membership.size() as u64) / 2 + 1
    }
}

fn generate_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
