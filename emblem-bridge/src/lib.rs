//! # Emblem Bridge
//!
//! Plays a turn-based tactical game through four input primitives (step,
//! confirm, cancel, cursor read) and state reads of the running process.
//!
//! Every transition is confirmed by polling state, with bounded reads and
//! one recovery retry. Attacks are probed through the game's own combat
//! forecast before one is committed.
//!
//! ## Layers
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`link`] | Input and state traits the game process implements |
//! | [`navigate`] | Cursor moves, bounded polling, recovery to the map |
//! | [`menu`] | Menu layouts, presses to reach an entry |
//! | [`probe`] | Probe-then-commit for attacks |
//! | [`actions`] | Moves, waits, items and drops |
//! | [`orchestrator`] | The turn loop |
//! | [`sim`] | Deterministic stand-in process with fault injection |

pub mod actions;
pub mod error;
pub mod link;
pub mod menu;
pub mod navigate;
pub mod orchestrator;
pub mod probe;
pub mod sim;

pub use actions::ActionExecutor;
pub use error::{LinkError, ProtocolError};
pub use link::{Direction, GameLink, InputDevice, StateSource};
pub use navigate::Navigator;
pub use orchestrator::{CancelToken, RunReport, TurnOrchestrator, UnitPlan, filter_actions};
pub use probe::{AttackPlan, ProbeCommit, ProbeState};
pub use sim::SimulatedGame;
