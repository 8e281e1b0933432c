use emblem_core::{Pos, UnitId};
use thiserror::Error;

/// Transport failure talking to the game process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("input delivery failed: {0}")]
    Input(String),
    #[error("state read failed: {0}")]
    State(String),
    #[error("game process closed")]
    Closed,
}

/// A step of the input protocol did not land where expected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("{what} desync: expected {expected}, observed {observed}")]
    Desync {
        what: &'static str,
        expected: String,
        observed: String,
    },
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("no battle projection for unit {unit} against enemy {enemy}")]
    PredictionUnavailable { unit: UnitId, enemy: UnitId },
    #[error("tile {0} cannot be reached")]
    Unreachable(Pos),
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl ProtocolError {
    /// Desyncs and timeouts earn one recovery and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Desync { .. } | Self::Timeout(_))
    }
}
