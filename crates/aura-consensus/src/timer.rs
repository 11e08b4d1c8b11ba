use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ConsensusError;

/// The two timers a node ever arms. Invariant I4 ("at most one of
/// `heartbeat`/`election` active at any time") is why this is a closed
/// enum rather than an arbitrary string: a role change clears both
/// before scheduling its next one, and there is never a third kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerName {
    Heartbeat,
    Election,
}

impl TimerName {
    fn label(self) -> &'static str {
        match self {
            TimerName::Heartbeat => "heartbeat",
            TimerName::Election => "election",
        }
    }
}

/// A named-timer facility: schedule, cancel, and adjust the duration of
/// an already-scheduled timer. Expiry is reported by sending `name` on an
/// mpsc channel rather than invoking a stored closure directly — the
/// receiving end is read from the node's own single-threaded event loop
/// (see `RaftNode::tick`), which is what actually serializes timer firing
/// with inbound-packet handling (§5): both arrive through channels that
/// loop consumes one at a time.
pub struct TimerRegistry {
    handles: HashMap<TimerName, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerName>,
}

impl TimerRegistry {
    /// Builds a registry paired with the receiver the owner should poll
    /// (typically inside a `tokio::select!` alongside inbound packets).
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerName>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                handles: HashMap::new(),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Schedules `name` to fire once after `duration`. Errors if a timer
    /// by that name is already active — callers should check `active()`
    /// and use `adjust()` instead.
    pub fn set(&mut self, name: TimerName, duration: Duration) -> Result<(), ConsensusError> {
        if self.handles.contains_key(&name) {
            return Err(ConsensusError::TimerAlreadyActive {
                name: name.label(),
            });
        }
        self.spawn(name, duration);
        Ok(())
    }

    pub fn active(&self, name: TimerName) -> bool {
        self.handles.contains_key(&name)
    }

    /// Resets an already-scheduled timer to a new duration without
    /// firing its current callback. Errors if no timer by that name is
    /// active — callers should check `active()` and use `set()` instead.
    pub fn adjust(&mut self, name: TimerName, duration: Duration) -> Result<(), ConsensusError> {
        match self.handles.remove(&name) {
            Some(handle) => {
                handle.abort();
                self.spawn(name, duration);
                Ok(())
            }
            None => Err(ConsensusError::UnknownTimer { name: name.label() }),
        }
    }

    /// Cancels all timers owned by this registry.
    pub fn clear(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    /// Removes the bookkeeping entry for a timer that has already fired
    /// (or aborts it, if for some reason it hasn't). Callers use this
    /// right after receiving `name` on the fired-timer channel, before
    /// `active(name)` is consulted again.
    pub fn clear_one(&mut self, name: TimerName) {
        if let Some(handle) = self.handles.remove(&name) {
            handle.abort();
        }
    }

    /// Clears all timers and releases the registry. Further `set`/
    /// `adjust` calls after `end()` still work mechanically, but the
    /// owning node must not call them once stopped (enforced by
    /// `RaftNode`, not here).
    pub fn end(&mut self) {
        self.clear();
    }

    fn spawn(&mut self, name: TimerName, duration: Duration) {
        let tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The node may already be gone (channel closed); nothing to do.
            let _ = tx.send(name);
        });
        self.handles.insert(name, handle);
    }
}
