//! # Emblem Core
//!
//! World model and decision pipeline for an engine that plays a turn-based
//! tactical game through an external, latency-bearing game process.
//!
//! This crate is pure: it turns snapshots into ranked actions and rewards.
//! Talking to the game process lives in `emblem-bridge`; learned estimators
//! live in `emblem-ai`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Snapshot │──▶│ ActionEnumerator │──▶│ ActionScorer │──▶ ranked actions
//! └────┬─────┘   └──────────────────┘   └──────────────┘
//!      │ before/after
//!      ▼
//! ┌─────────────────┐   ┌────────────────┐
//! │ RewardEstimator │──▶│ TrainingSink   │
//! └─────────────────┘   └────────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Snapshot`] | One polling cycle's view of units, terrain, phase |
//! | [`Action`] | Candidate move / attack / item / rescue |
//! | [`ActionEnumerator`] | Legal actions for one unit |
//! | [`ActionScorer`] | Heuristic or learned scoring, stable ranking |
//! | [`BattleProjection`] | The game's combat forecast for one candidate attack |
//! | [`RewardEstimator`] | Training signal from snapshot deltas |
//! | [`TrainingSink`] | Receives `(before, action, reward, after)` records |

pub mod action;
pub mod ai;
pub mod combat;
pub mod config;
pub mod enumerate;
pub mod items;
pub mod maps;
pub mod metrics;
pub mod observer;
pub mod outcome;
pub mod reward;
pub mod state;
pub mod testing;

pub use action::{Action, ActionKind};
pub use ai::{
    ActionEstimator, ActionFeatures, ActionScorer, EpsilonGreedy, EstimatorError, FeatureError,
    HeuristicScorer, FEATURE_DIM,
};
pub use combat::BattleProjection;
pub use config::{ConfigError, EngineConfig, ExplorationConfig, PollConfig};
pub use enumerate::ActionEnumerator;
pub use maps::{MovementMap, RangeMap, UnitMaps, UNREACHABLE};
pub use metrics::EngineMetrics;
pub use observer::{DecisionRecord, JsonlSink, ReplayBuffer, SinkError, SinkRegistry, TrainingSink};
pub use outcome::{check_terminal, critical_unit_dead, level_beaten, TerminationCause};
pub use reward::{RewardEstimator, RewardWeights};
pub use state::{
    Allegiance, InventorySlot, ItemId, Phase, Pos, Snapshot, StateError, Stats, TerrainClass,
    TerrainGrid, TerrainModifiers, TurnStatus, Unit, UnitId,
};
