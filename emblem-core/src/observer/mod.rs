//! Decision records for the training collaborator.
//!
//! After every committed unit action the orchestrator emits one
//! [`DecisionRecord`] `(before, action, reward, after)`. Sinks receive records
//! by shared reference and must not influence play.
//!
//! ```text
//! TrainingSink trait
//!        │
//!        ├── JsonlSink (one JSON object per line, file or stdout)
//!        └── ReplayBuffer (bounded in-memory ring)
//! ```
//!
//! Sink errors are logged by [`SinkRegistry`] and never block a run.

pub mod jsonl;
pub mod replay;

pub use jsonl::JsonlSink;
pub use replay::ReplayBuffer;

use crate::action::Action;
use crate::state::Snapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One decision and its consequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub episode: u32,
    pub turn: u32,
    pub before: Snapshot,
    pub action: Action,
    pub reward: f32,
    pub after: Snapshot,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Sink writer lock poisoned")]
    Poisoned,
}

pub trait TrainingSink: Send + Sync {
    fn record(&self, record: &DecisionRecord) -> Result<(), SinkError>;

    fn name(&self) -> &str;

    /// Flush buffered output. Default is a no-op.
    fn on_shutdown(&self) {}
}

/// Fans records out to every registered sink.
pub struct SinkRegistry {
    sinks: Vec<Box<dyn TrainingSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self { sinks: vec![] }
    }

    pub fn register(&mut self, sink: Box<dyn TrainingSink>) {
        log::info!("Registered training sink: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn notify(&self, record: &DecisionRecord) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(record) {
                log::warn!("Training sink '{}' error: {}", sink.name(), e);
            }
        }
    }

    pub fn shutdown(&self) {
        for sink in &self.sinks {
            sink.on_shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SinkRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::Pos;
    use crate::testing::SnapshotBuilder;
    use std::sync::Arc;

    pub(crate) fn sample_record(reward: f32) -> DecisionRecord {
        let before = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(0, 0), |_| {})
            .enemy(10, Pos::new(2, 2), |_| {})
            .build();
        let action = Action::move_to(before.ally(1).unwrap(), Pos::new(1, 0));
        let mut after = before.clone();
        after.allies[0].pos = Pos::new(1, 0);
        DecisionRecord {
            episode: 0,
            turn: 1,
            before,
            action,
            reward,
            after,
        }
    }

    struct Failing;

    impl TrainingSink for Failing {
        fn record(&self, _record: &DecisionRecord) -> Result<(), SinkError> {
            Err(SinkError::Poisoned)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_registry_survives_failing_sink() {
        let buffer = Arc::new(ReplayBuffer::new(4));
        let mut registry = SinkRegistry::new();
        registry.register(Box::new(Failing));
        registry.register(Box::new(Arc::clone(&buffer)));
        assert_eq!(registry.len(), 2);

        registry.notify(&sample_record(1.0));
        assert_eq!(buffer.len(), 1);
    }
}
