//! Action scoring and selection.
//!
//! Every candidate [`Action`] is reduced to a fixed-shape [`ActionFeatures`]
//! record and scored, either by the deterministic [`HeuristicScorer`] or by a
//! pluggable [`ActionEstimator`] (a learned model living in another crate).
//!
//! # Fallback
//!
//! Estimators may fail, return the wrong number of scores, or produce
//! non-finite values. In all of those cases [`ActionScorer`] logs a warning
//! and scores the batch with the heuristic instead, so ranking never fails.
//!
//! # Determinism
//!
//! Ranking is a stable sort by score descending: ties keep enumeration order.
//! Exploration ([`EpsilonGreedy`]) draws from a seeded RNG so whole runs can
//! be replayed.

pub mod explore;
pub mod features;
pub mod heuristic;

pub use explore::EpsilonGreedy;
pub use features::{ActionFeatures, FeatureError, FEATURE_DIM};
pub use heuristic::HeuristicScorer;

use crate::action::Action;
use crate::state::Snapshot;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("estimator unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A learned scorer over feature batches.
///
/// Implementations return one score per input row, higher is better.
pub trait ActionEstimator: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, batch: &[ActionFeatures]) -> Result<Vec<f32>, EstimatorError>;
}

/// Scores and ranks candidate actions.
pub struct ActionScorer {
    estimator: Option<Box<dyn ActionEstimator>>,
    heuristic: HeuristicScorer,
}

impl ActionScorer {
    pub fn heuristic() -> Self {
        Self {
            estimator: None,
            heuristic: HeuristicScorer::new(),
        }
    }

    pub fn with_estimator(estimator: Box<dyn ActionEstimator>) -> Self {
        Self {
            estimator: Some(estimator),
            heuristic: HeuristicScorer::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.estimator
            .as_ref()
            .map(|e| e.name())
            .unwrap_or("heuristic")
    }

    /// One score per feature row, falling back to the heuristic on any
    /// estimator problem.
    pub fn score_features(&self, batch: &[ActionFeatures]) -> Vec<f32> {
        if let Some(estimator) = &self.estimator {
            match estimator.estimate(batch) {
                Ok(scores) if scores.len() == batch.len() && scores.iter().all(|s| s.is_finite()) => {
                    return scores;
                }
                Ok(scores) => log::warn!(
                    "Estimator {} returned {} scores for {} actions (or non-finite values), using heuristic",
                    estimator.name(),
                    scores.len(),
                    batch.len()
                ),
                Err(e) => log::warn!("Estimator {} failed: {}, using heuristic", estimator.name(), e),
            }
        }
        batch.iter().map(|f| self.heuristic.score(f)).collect()
    }

    /// Score `actions` in place and return them best first.
    ///
    /// Actions whose features cannot be extracted are dropped with a warning.
    pub fn rank(&self, snapshot: &Snapshot, actions: Vec<Action>) -> Vec<Action> {
        let mut kept = Vec::with_capacity(actions.len());
        let mut batch = Vec::with_capacity(actions.len());
        for action in actions {
            match ActionFeatures::extract(snapshot, &action) {
                Ok(features) => {
                    batch.push(features);
                    kept.push(action);
                }
                Err(e) => log::warn!("Dropping action ({}): {}", action, e),
            }
        }

        let scores = self.score_features(&batch);
        for (action, score) in kept.iter_mut().zip(scores) {
            action.score = score;
        }
        // Stable: ties keep enumeration order.
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept
    }
}

impl Default for ActionScorer {
    fn default() -> Self {
        Self::heuristic()
    }
}
