use std::time::Duration;

use crate::error::ConsensusError;

/// Default election timeout bounds (Raft §5.2 recommends staggering these
/// widely past the heartbeat interval to avoid spurious elections).
const DEFAULT_ELECTION_MIN_MS: u64 = 150;
const DEFAULT_ELECTION_MAX_MS: u64 = 300;

/// Default heartbeat bounds. Kept well under the election minimum so a
/// live leader's heartbeats always land before a follower's timer fires.
const DEFAULT_HEARTBEAT_MIN_MS: u64 = 50;
const DEFAULT_HEARTBEAT_MAX_MS: u64 = 70;

const DEFAULT_THRESHOLD: f64 = 0.8;

/// A duration accepted either as raw milliseconds or a human-readable
/// string such as `"150 ms"` or `"2 s"`. Mirrors the duration inputs the
/// node construction options recognize.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationSpec {
    Millis(u64),
    Text(String),
}

impl DurationSpec {
    pub fn resolve(&self) -> Result<Duration, ConsensusError> {
        match self {
            DurationSpec::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationSpec::Text(text) => parse_duration_string(text),
        }
    }
}

impl From<u64> for DurationSpec {
    fn from(ms: u64) -> Self {
        DurationSpec::Millis(ms)
    }
}

impl From<&str> for DurationSpec {
    fn from(text: &str) -> Self {
        DurationSpec::Text(text.to_string())
    }
}

impl From<String> for DurationSpec {
    fn from(text: String) -> Self {
        DurationSpec::Text(text)
    }
}

fn parse_duration_string(input: &str) -> Result<Duration, ConsensusError> {
    let invalid = |reason: &str| ConsensusError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let (number_part, unit) = match trimmed.strip_suffix("ms") {
        Some(rest) => (rest.trim(), 1.0_f64),
        None => match trimmed.strip_suffix('s') {
            Some(rest) => (rest.trim(), 1000.0_f64),
            None => (trimmed, 1.0_f64),
        },
    };

    let value: f64 = number_part
        .parse()
        .map_err(|_| invalid("not a number"))?;

    if !value.is_finite() {
        return Err(invalid("not finite"));
    }
    if value < 0.0 {
        return Err(invalid("negative durations are not allowed"));
    }

    Ok(Duration::from_millis((value * unit).round() as u64))
}

/// A resolved `(min, max)` bound, guaranteed `min <= max` once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutRange {
    pub min: Duration,
    pub max: Duration,
}

/// Node construction options — the typed equivalent of the recognized
/// option-bag keys (`id`/`name`, `election min`/`election max`,
/// `heartbeat min`/`heartbeat max`, `threshold`).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub id: Option<String>,
    pub election_min: DurationSpec,
    pub election_max: DurationSpec,
    pub heartbeat_min: DurationSpec,
    pub heartbeat_max: DurationSpec,
    pub threshold: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            election_min: DurationSpec::Millis(DEFAULT_ELECTION_MIN_MS),
            election_max: DurationSpec::Millis(DEFAULT_ELECTION_MAX_MS),
            heartbeat_min: DurationSpec::Millis(DEFAULT_HEARTBEAT_MIN_MS),
            heartbeat_max: DurationSpec::Millis(DEFAULT_HEARTBEAT_MAX_MS),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl NodeConfig {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_election_range(
        mut self,
        min: impl Into<DurationSpec>,
        max: impl Into<DurationSpec>,
    ) -> Self {
        self.election_min = min.into();
        self.election_max = max.into();
        self
    }

    pub fn with_heartbeat_range(
        mut self,
        min: impl Into<DurationSpec>,
        max: impl Into<DurationSpec>,
    ) -> Self {
        self.heartbeat_min = min.into();
        self.heartbeat_max = max.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub(crate) fn election_range(&self) -> Result<TimeoutRange, ConsensusError> {
        resolve_range(&self.election_min, &self.election_max)
    }

    pub(crate) fn heartbeat_range(&self) -> Result<TimeoutRange, ConsensusError> {
        resolve_range(&self.heartbeat_min, &self.heartbeat_max)
    }
}

fn resolve_range(min: &DurationSpec, max: &DurationSpec) -> Result<TimeoutRange, ConsensusError> {
    let min = min.resolve()?;
    let max = max.resolve()?;
    if min > max {
        return Err(ConsensusError::InvalidDuration {
            input: format!("{:?}..{:?}", min, max),
            reason: "min must not exceed max".to_string(),
        });
    }
    Ok(TimeoutRange { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = NodeConfig::default();
        let election = cfg.election_range().unwrap();
        let heartbeat = cfg.heartbeat_range().unwrap();
        assert_eq!(election.min, Duration::from_millis(150));
        assert_eq!(election.max, Duration::from_millis(300));
        assert_eq!(heartbeat.min, Duration::from_millis(50));
        assert_eq!(heartbeat.max, Duration::from_millis(70));
        assert_eq!(cfg.threshold, 0.8);
    }

    #[test]
    fn parses_human_readable_strings() {
        assert_eq!(
            parse_duration_string("150 ms").unwrap(),
            Duration::from_millis(150)
        );
        assert_eq!(parse_duration_string("2s").unwrap(), Duration::from_millis(2000));
        assert_eq!(parse_duration_string("150").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(parse_duration_string("-5 ms").is_err());
        assert!(parse_duration_string("NaN ms").is_err());
        assert!(parse_duration_string("banana").is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let cfg = NodeConfig::default().with_election_range(300_u64, 150_u64);
        assert!(cfg.election_range().is_err());
    }
}
