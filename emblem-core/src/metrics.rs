use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters accumulated over a run.
#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub probes_issued: u64,
    pub probes_failed: u64,
    pub desyncs_recovered: u64,
    pub commits: u64,
    pub decisions: u64,
    pub turns: u64,
    pub total_reward: f64,
    /// Wall time spent probing attack candidates.
    pub probe_time: Duration,
    pub wall_time: Duration,
}

impl EngineMetrics {
    pub fn probe_success_rate(&self) -> f64 {
        if self.probes_issued == 0 {
            0.0
        } else {
            (self.probes_issued - self.probes_failed) as f64 / self.probes_issued as f64
        }
    }

    pub fn avg_probe_ms(&self) -> f64 {
        if self.probes_issued == 0 {
            0.0
        } else {
            self.probe_time.as_secs_f64() * 1000.0 / self.probes_issued as f64
        }
    }

    /// Fold another run's counters into this one.
    pub fn merge(&mut self, other: &EngineMetrics) {
        self.probes_issued += other.probes_issued;
        self.probes_failed += other.probes_failed;
        self.desyncs_recovered += other.desyncs_recovered;
        self.commits += other.commits;
        self.decisions += other.decisions;
        self.turns += other.turns;
        self.total_reward += other.total_reward;
        self.probe_time += other.probe_time;
        self.wall_time += other.wall_time;
    }
}
