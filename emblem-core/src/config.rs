use crate::reward::RewardWeights;
use crate::state::UnitId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Bounded polling of the external process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
    /// Identical consecutive reads required before a cursor position or
    /// screen counts as settled. Input lag below this many reads is
    /// absorbed.
    pub settle_reads: u32,
}

impl PollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reads allowed within the default timeout.
    pub fn max_reads(&self) -> u32 {
        self.reads_within(self.timeout())
    }

    /// Reads allowed within `timeout`, at least one.
    pub fn reads_within(&self, timeout: Duration) -> u32 {
        let reads = timeout.as_millis() / self.interval_ms.max(1) as u128;
        reads.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            interval_ms: 50,
            settle_reads: 3,
        }
    }
}

/// Linear epsilon decay for exploration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub start: f64,
    pub end: f64,
    pub decay_episodes: u32,
    pub seed: u64,
}

impl ExplorationConfig {
    pub fn rate_at(&self, episode: u32) -> f64 {
        if self.decay_episodes == 0 {
            return self.end;
        }
        let progress = (episode as f64 / self.decay_episodes as f64).min(1.0);
        self.start + (self.end - self.start) * progress
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 0.1,
            decay_episodes: 500,
            seed: 0,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll: PollConfig,
    /// Wait for a committed unit to show as acted.
    pub commit_timeout_ms: u64,
    /// Wait for each half of a phase change.
    pub phase_timeout_ms: u64,
    /// Upper bound on cancel presses during recovery.
    pub cancel_presses: u32,
    /// Defensive tiles probed before plain tiles are skipped.
    pub max_good_tile_probes: usize,
    /// Units whose death ends the run.
    pub protected_units: Vec<UnitId>,
    /// Units that must at least wait before the turn ends.
    pub must_act: Vec<UnitId>,
    pub max_turns: u32,
    /// Consecutive turns with an unchanged board before the run counts as
    /// stalled.
    pub stall_turns: u32,
    pub exploration: ExplorationConfig,
    pub reward: RewardWeights,
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            commit_timeout_ms: 5_000,
            phase_timeout_ms: 30_000,
            cancel_presses: 4,
            max_good_tile_probes: 2,
            protected_units: vec![1, 2, 3],
            must_act: Vec::new(),
            max_turns: 50,
            stall_turns: 3,
            exploration: ExplorationConfig::default(),
            reward: RewardWeights::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_good_tile_probes, 2);
        assert_eq!(config.protected_units, vec![1, 2, 3]);
        assert_eq!(config.poll.timeout(), Duration::from_secs(2));
        assert_eq!(config.poll.settle_reads, 3);
    }

    #[test]
    fn test_read_budget() {
        let poll = PollConfig::default();
        assert_eq!(poll.max_reads(), 40);
        assert_eq!(poll.reads_within(Duration::from_secs(5)), 100);
        assert_eq!(
            poll.reads_within(EngineConfig::default().phase_timeout()),
            600
        );

        let instant = PollConfig {
            interval_ms: 0,
            timeout_ms: 20,
            ..PollConfig::default()
        };
        assert_eq!(instant.max_reads(), 20);
        assert_eq!(instant.reads_within(Duration::ZERO), 1);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "must_act": [4], "poll": { "interval_ms": 5 } }"#).unwrap();
        assert_eq!(config.must_act, vec![4]);
        assert_eq!(config.poll.interval_ms, 5);
        assert_eq!(config.poll.timeout_ms, 2_000);
        assert_eq!(config.cancel_presses, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_turns": 7 }}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_turns, 7);

        let err = EngineConfig::from_json_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_exploration_schedule() {
        let schedule = ExplorationConfig::default();
        assert_eq!(schedule.rate_at(0), 1.0);
        assert!((schedule.rate_at(250) - 0.55).abs() < 1e-9);
        assert!((schedule.rate_at(500) - 0.1).abs() < 1e-9);
        assert!((schedule.rate_at(9_999) - 0.1).abs() < 1e-9);
    }
}
