use crate::state::{Snapshot, UnitId, ITEM_DROPPER_HIDDEN_STATUS};
use serde::{Deserialize, Serialize};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCause {
    Victory,
    CriticalDeath(UnitId),
    /// Recovery failed twice on a step the run cannot skip.
    DesyncExhausted,
    /// The board stayed unchanged for several consecutive turns.
    Stalled,
    Cancelled,
    TurnLimit,
}

impl TerminationCause {
    pub fn is_victory(self) -> bool {
        self == Self::Victory
    }
}

impl std::fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Victory => write!(f, "victory"),
            Self::CriticalDeath(id) => write!(f, "critical unit {} died", id),
            Self::DesyncExhausted => write!(f, "desync not recoverable"),
            Self::Stalled => write!(f, "stalled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TurnLimit => write!(f, "turn limit reached"),
        }
    }
}

/// Every enemy is dead and at least one of them was a real combatant rather
/// than a pure item dropper.
pub fn level_beaten(snapshot: &Snapshot) -> bool {
    snapshot.enemies.iter().all(|e| !e.is_alive())
        && snapshot
            .enemies
            .iter()
            .any(|e| e.hidden_status != ITEM_DROPPER_HIDDEN_STATUS)
}

/// First protected ally found dead.
pub fn critical_unit_dead(snapshot: &Snapshot, protected: &[UnitId]) -> Option<UnitId> {
    snapshot
        .allies
        .iter()
        .find(|u| protected.contains(&u.id) && !u.is_alive())
        .map(|u| u.id)
}

/// Terminal check run before every unit decision.
pub fn check_terminal(snapshot: &Snapshot, protected: &[UnitId]) -> Option<TerminationCause> {
    if let Some(id) = critical_unit_dead(snapshot, protected) {
        return Some(TerminationCause::CriticalDeath(id));
    }
    if level_beaten(snapshot) {
        return Some(TerminationCause::Victory);
    }
    None
}
