use crate::state::{ItemId, Pos, Unit, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
    Attack,
    Rescue,
    UseItem,
}

impl ActionKind {
    /// Numeric code used in feature vectors.
    pub fn code(self) -> u8 {
        match self {
            Self::Move => 0,
            Self::Attack => 1,
            Self::Rescue => 2,
            Self::UseItem => 3,
        }
    }
}

/// A candidate action for one unit. Recomputed every decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub unit: UnitId,
    pub origin: Pos,
    pub kind: ActionKind,
    /// Destination for moves, launch tile for attacks, own tile otherwise.
    pub target: Pos,
    pub target_unit: Option<UnitId>,
    pub item: Option<ItemId>,
    /// Inventory slot of `item`, used to walk the weapon/item menus.
    pub slot: Option<usize>,
    pub score: f32,
}

impl Action {
    fn base(unit: &Unit, kind: ActionKind, target: Pos) -> Self {
        Self {
            unit: unit.id,
            origin: unit.pos,
            kind,
            target,
            target_unit: None,
            item: None,
            slot: None,
            score: 0.0,
        }
    }

    pub fn move_to(unit: &Unit, target: Pos) -> Self {
        Self::base(unit, ActionKind::Move, target)
    }

    /// Stay in place and wait.
    pub fn wait(unit: &Unit) -> Self {
        Self::move_to(unit, unit.pos)
    }

    pub fn attack(unit: &Unit, from: Pos, enemy: UnitId, slot: usize, item: ItemId) -> Self {
        Self {
            target_unit: Some(enemy),
            item: Some(item),
            slot: Some(slot),
            ..Self::base(unit, ActionKind::Attack, from)
        }
    }

    pub fn rescue(unit: &Unit, carried: UnitId) -> Self {
        Self {
            target_unit: Some(carried),
            ..Self::base(unit, ActionKind::Rescue, unit.pos)
        }
    }

    pub fn use_item(unit: &Unit, slot: usize, item: ItemId) -> Self {
        Self {
            item: Some(item),
            slot: Some(slot),
            ..Self::base(unit, ActionKind::UseItem, unit.pos)
        }
    }

    pub fn is_attack(&self) -> bool {
        self.kind == ActionKind::Attack
    }

    /// A move that ends where it started.
    pub fn is_noop(&self) -> bool {
        self.kind == ActionKind::Move && self.target == self.origin
    }

    /// De-duplication key for attacks: (enemy, item, launch tile).
    pub fn attack_key(&self) -> Option<(UnitId, ItemId, Pos)> {
        match (self.kind, self.target_unit, self.item) {
            (ActionKind::Attack, Some(enemy), Some(item)) => Some((enemy, item, self.target)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ActionKind::Move if self.is_noop() => write!(f, "unit {} waits at {}", self.unit, self.origin),
            ActionKind::Move => write!(f, "unit {} moves {} -> {}", self.unit, self.origin, self.target),
            ActionKind::Attack => write!(
                f,
                "unit {} attacks enemy {} from {} with item 0x{:02X}",
                self.unit,
                self.target_unit.unwrap_or_default(),
                self.target,
                self.item.unwrap_or_default()
            ),
            ActionKind::Rescue => write!(
                f,
                "unit {} rescues unit {}",
                self.unit,
                self.target_unit.unwrap_or_default()
            ),
            ActionKind::UseItem => write!(
                f,
                "unit {} uses item 0x{:02X}",
                self.unit,
                self.item.unwrap_or_default()
            ),
        }
    }
}
