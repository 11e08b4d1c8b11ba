use tokio::sync::broadcast;

use crate::node::Role;
use crate::packet::Packet;

/// Backlog kept per slow subscriber before `broadcast` starts dropping
/// the oldest event. Lifecycle events are infrequent (at most a handful
/// per election round) so this is generous headroom, not a tuned value.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything a node publishes about its own lifecycle. This is the
/// seam a transport (or a test) attaches to; the node never reads back
/// its own bus, only writes to it.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    TermChange { new: u64, old: u64 },
    StateChange { new: Role, old: Role },
    LeaderChange { new: Option<String>, old: Option<String> },
    HeartbeatTimeout,
    /// A vote this node cast, with the request that prompted it.
    Vote { packet: Packet, granted: bool },
    /// Ingress demultiplex point: every well-formed inbound packet,
    /// before rule dispatch, for observers that want a raw tap.
    Data { packet: Packet },
}

/// Named synchronous event dispatcher. "Synchronous" here means `emit`
/// never awaits: `broadcast::Sender::send` is a plain (non-async) call,
/// so publishing an event can never introduce a suspension point inside
/// a transition, preserving "every handler runs to completion" (§5).
pub struct EventBus {
    sender: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Registers a new listener. Events emitted before a given
    /// subscription are not visible to that receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event` to all current subscribers. No subscribers is
    /// not an error — a node with nothing attached yet still runs.
    pub fn emit(&self, event: NodeEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
