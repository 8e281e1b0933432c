use crate::items;
use crate::state::{
    Allegiance, InventorySlot, Phase, Pos, Snapshot, Stats, TerrainGrid, TurnStatus, Unit, UnitId,
};

/// Fixture builder for snapshots. Units get sensible defaults and can be
/// tweaked through a closure.
pub struct SnapshotBuilder {
    state: Snapshot,
}

impl SnapshotBuilder {
    /// An all-plains board of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Snapshot {
                turn: 1,
                chapter: 0,
                phase: Phase::Ally,
                cursor: Pos::new(0, 0),
                terrain: TerrainGrid::filled(width, height, "."),
                allies: Vec::new(),
                enemies: Vec::new(),
            },
        }
    }

    pub fn terrain(mut self, terrain: TerrainGrid) -> Self {
        self.state.terrain = terrain;
        self
    }

    pub fn turn(mut self, turn: u32) -> Self {
        self.state.turn = turn;
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.state.phase = phase;
        self
    }

    pub fn cursor(mut self, pos: Pos) -> Self {
        self.state.cursor = pos;
        self
    }

    /// Sword-wielding ally with 20 HP and 5 movement.
    pub fn ally(mut self, id: UnitId, pos: Pos, tweak: impl FnOnce(&mut Unit)) -> Self {
        let mut unit = Unit {
            id,
            name: format!("Ally {}", id),
            allegiance: Allegiance::Ally,
            pos,
            hp: 20,
            max_hp: 20,
            stats: Stats {
                strength: 6,
                skill: 6,
                speed: 6,
                luck: 4,
                defense: 4,
                resistance: 1,
                movement: 5,
                level: 1,
            },
            items: vec![InventorySlot::new(items::IRON_SWORD, 40)],
            status: TurnStatus::NotActed,
            hidden_status: 0,
        };
        tweak(&mut unit);
        self.state.allies.push(unit);
        self
    }

    /// Axe-wielding enemy with 18 HP.
    pub fn enemy(mut self, id: UnitId, pos: Pos, tweak: impl FnOnce(&mut Unit)) -> Self {
        let mut unit = Unit {
            id,
            name: format!("Enemy {}", id),
            allegiance: Allegiance::Enemy,
            pos,
            hp: 18,
            max_hp: 18,
            stats: Stats {
                strength: 5,
                skill: 3,
                speed: 3,
                luck: 0,
                defense: 3,
                resistance: 0,
                movement: 5,
                level: 1,
            },
            items: vec![InventorySlot::new(items::IRON_AXE, 40)],
            status: TurnStatus::NotActed,
            hidden_status: 0,
        };
        tweak(&mut unit);
        self.state.enemies.push(unit);
        self
    }

    pub fn build(self) -> Snapshot {
        self.state
    }
}
