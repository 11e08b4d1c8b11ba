use serde::{Deserialize, Serialize};

use crate::node::Role;

/// The message kind carried by a `Packet`. A sealed set rather than a
/// dynamic string, per the design note calling for a statically-typed
/// target to prefer a closed set of event/message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    Heartbeat,
    Vote,
    Voted,
    Rpc,
}

/// Kind-specific payload. `last_log_index`/`last_log_term` on `Vote` are
/// reserved hooks for a future log-replication module (Raft §5.4) — they
/// are round-tripped but never consulted for a freshness decision here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PacketData {
    Heartbeat {
        /// Duration (ms) the sender wants the recipient to wait before
        /// its own watchdog would expire. Absent means "use the
        /// recipient's own freshly generated timeout".
        duration_ms: Option<u64>,
    },
    Vote {
        last_log_index: u64,
        last_log_term: u64,
    },
    Voted {
        granted: bool,
    },
    Rpc {
        payload: serde_json::Value,
    },
    Empty,
}

/// The envelope exchanged between nodes: sender identity, sender state,
/// sender term, message kind, and kind-specific payload. No framing is
/// specified here; a transport chooses how to put this on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub state: Role,
    pub term: u64,
    pub name: String,
    pub kind: PacketKind,
    pub data: PacketData,
}

impl Packet {
    pub fn new(state: Role, term: u64, name: impl Into<String>, kind: PacketKind, data: PacketData) -> Self {
        Self {
            state,
            term,
            name: name.into(),
            kind,
            data,
        }
    }
}
