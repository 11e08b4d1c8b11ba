use rand::Rng;
use std::time::Duration;

use crate::config::TimeoutRange;

/// The two timer classes a node arms. Each draws independently from its
/// own `[min, max]` range — randomization is what keeps peers from
/// converging on the same election timeout and splitting every vote
/// (Raft §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Heartbeat,
    Election,
}

/// Draws a uniformly random duration in `range`, inclusive of both ends.
pub fn timeout(range: TimeoutRange) -> Duration {
    if range.min == range.max {
        return range.min;
    }
    let min_ms = range.min.as_millis() as u64;
    let max_ms = range.max.as_millis() as u64;
    let millis = rand::thread_rng().gen_range(min_ms..=max_ms);
    Duration::from_millis(millis)
}
