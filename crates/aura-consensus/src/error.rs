use thiserror::Error;

/// Errors the consensus core can surface directly to a caller.
///
/// Everything Raft considers a normal hazard (stale term, malformed
/// ingress, a vote refusal, operating on a stopped node) is handled
/// inside the node via silent drops, `bool` returns, or events per the
/// protocol's own rules — it never becomes a `ConsensusError`. These
/// variants are reserved for programmer errors and config-time faults.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("timer '{name}' is already active; use adjust() instead of set()")]
    TimerAlreadyActive { name: &'static str },

    #[error("unknown timer '{name}'")]
    UnknownTimer { name: &'static str },

    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("invalid threshold {value}: must be within [0, 1]")]
    InvalidThreshold { value: f64 },
}
