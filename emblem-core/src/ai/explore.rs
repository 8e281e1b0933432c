use crate::action::Action;
use crate::config::ExplorationConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Epsilon-greedy pick over a ranked action list.
pub struct EpsilonGreedy {
    rng: StdRng,
    schedule: ExplorationConfig,
    rate: f64,
}

impl EpsilonGreedy {
    pub fn new(schedule: ExplorationConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(schedule.seed),
            rate: schedule.rate_at(0),
            schedule,
        }
    }

    /// Never explores.
    pub fn greedy() -> Self {
        Self::new(ExplorationConfig {
            start: 0.0,
            end: 0.0,
            ..Default::default()
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Move the rate along the decay schedule.
    pub fn begin_episode(&mut self, episode: u32) {
        self.rate = self.schedule.rate_at(episode);
    }

    /// The best action, or with probability `rate` a uniformly random one.
    pub fn pick<'a>(&mut self, ranked: &'a [Action]) -> Option<&'a Action> {
        if ranked.is_empty() {
            return None;
        }
        if self.rate > 0.0 && self.rng.gen::<f64>() < self.rate {
            return ranked.choose(&mut self.rng);
        }
        ranked.first()
    }
}
