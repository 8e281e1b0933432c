//! Movement and attack-range grids for the currently selected unit.
//!
//! The external process exposes both grids while a unit is selected. They can
//! also be derived locally from a snapshot, which is what the simulated game
//! does.

use crate::state::{Pos, Snapshot, Unit};
use serde::{Deserialize, Serialize};
use tile_pathfinding::{Graph, Reach};

/// Movement-map sentinel for cells the unit cannot reach.
pub const UNREACHABLE: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementMap {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl MovementMap {
    /// Build from row-major rows. Short rows are padded as unreachable.
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let (width, height, cells) = flatten(rows, UNREACHABLE);
        Self {
            width,
            height,
            cells,
        }
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        cell_index(self.width, self.height, pos)
    }

    /// Cost to reach `pos`, `None` when unreachable or off the grid.
    pub fn cost_at(&self, pos: Pos) -> Option<u8> {
        self.index(pos)
            .map(|i| self.cells[i])
            .filter(|&c| c != UNREACHABLE)
    }

    pub fn is_reachable(&self, pos: Pos) -> bool {
        self.cost_at(pos).is_some()
    }

    pub fn reachable(&self) -> impl Iterator<Item = Pos> + '_ {
        let width = self.width as i32;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != UNREACHABLE)
            .map(move |(i, _)| Pos::new(i as i32 % width, i as i32 / width))
    }

    /// Flood the terrain from the unit's tile with its movement budget.
    /// Enemies of the mover block; friendly units can be passed through.
    pub fn compute(snapshot: &Snapshot, unit: &Unit) -> Self {
        let grid = &snapshot.terrain;
        let reach = Reach::within(&TileGraph { snapshot }, unit.pos, unit.movement(), unit);
        let mut cells = vec![UNREACHABLE; grid.cells.len()];
        for (pos, cost) in reach {
            let index = cell_index(grid.width, grid.height, pos);
            if let Some(cell) = index.and_then(|i| cells.get_mut(i)) {
                *cell = cost.min(UNREACHABLE as u32 - 1) as u8;
            }
        }
        Self {
            width: grid.width,
            height: grid.height,
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMap {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl RangeMap {
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let (width, height, cells) = flatten(rows, 0);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn in_range(&self, pos: Pos) -> bool {
        cell_index(self.width, self.height, pos).is_some_and(|i| self.cells[i] != 0)
    }

    /// Every cell some usable weapon can hit from a tile the unit can end on.
    pub fn compute(snapshot: &Snapshot, unit: &Unit, movement: &MovementMap) -> Self {
        let grid = &snapshot.terrain;
        let mut cells = vec![0u8; grid.cells.len()];
        let launch: Vec<Pos> = movement
            .reachable()
            .filter(|&p| !snapshot.is_blocked_for(p, unit))
            .collect();

        for (_, weapon) in unit.weapons() {
            for &from in &launch {
                for target in grid.positions() {
                    if weapon.reaches(from.distance(target)) {
                        let index = cell_index(grid.width, grid.height, target);
                        if let Some(cell) = index.and_then(|i| cells.get_mut(i)) {
                            *cell = 1;
                        }
                    }
                }
            }
        }

        Self {
            width: grid.width,
            height: grid.height,
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMaps {
    pub movement: MovementMap,
    pub range: RangeMap,
}

impl UnitMaps {
    pub fn compute(snapshot: &Snapshot, unit: &Unit) -> Self {
        let movement = MovementMap::compute(snapshot, unit);
        let range = RangeMap::compute(snapshot, unit, &movement);
        Self { movement, range }
    }
}

fn cell_index(width: u32, height: u32, pos: Pos) -> Option<usize> {
    if pos.x < 0 || pos.y < 0 || pos.x as u32 >= width || pos.y as u32 >= height {
        return None;
    }
    Some(pos.y as usize * width as usize + pos.x as usize)
}

fn flatten(rows: &[Vec<u8>], pad: u8) -> (u32, u32, Vec<u8>) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut cells = Vec::with_capacity(width * rows.len());
    for row in rows {
        cells.extend_from_slice(row);
        cells.extend(std::iter::repeat(pad).take(width - row.len()));
    }
    (width as u32, rows.len() as u32, cells)
}

struct TileGraph<'a> {
    snapshot: &'a Snapshot,
}

impl Graph<Pos, Unit> for TileGraph<'_> {
    fn neighbors(&self, node: Pos, _mover: &Unit) -> Vec<Pos> {
        node.neighbors()
            .into_iter()
            .filter(|&p| self.snapshot.terrain.in_bounds(p))
            .collect()
    }

    fn cost(&self, _from: Pos, to: Pos, mover: &Unit) -> Option<u32> {
        if self
            .snapshot
            .occupant(to)
            .is_some_and(|o| o.allegiance != mover.allegiance)
        {
            return None;
        }
        self.snapshot.terrain.class(to).move_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TerrainGrid;
    use crate::testing::SnapshotBuilder;

    #[test]
    fn test_from_rows_sentinels() {
        let map = MovementMap::from_rows(&[vec![0, 1, UNREACHABLE], vec![1, 2]]);
        assert_eq!(map.cost_at(Pos::new(1, 0)), Some(1));
        assert!(!map.is_reachable(Pos::new(2, 0)));
        // padded
        assert!(!map.is_reachable(Pos::new(2, 1)));
        assert!(!map.is_reachable(Pos::new(-1, 0)));

        let range = RangeMap::from_rows(&[vec![0, 1]]);
        assert!(range.in_range(Pos::new(1, 0)));
        assert!(!range.in_range(Pos::new(0, 0)));
    }

    #[test]
    fn test_enemy_blocks_path() {
        // Corridor of plains walled above and below, enemy in the middle.
        let terrain = TerrainGrid::from_rows(&["# # # # #", ". . . . .", "# # # # #"]).unwrap();
        let snapshot = SnapshotBuilder::new(5, 3)
            .terrain(terrain)
            .ally(1, Pos::new(0, 1), |u| u.stats.movement = 4)
            .enemy(10, Pos::new(2, 1), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        let map = MovementMap::compute(&snapshot, unit);

        assert_eq!(map.cost_at(Pos::new(0, 1)), Some(0));
        assert_eq!(map.cost_at(Pos::new(1, 1)), Some(1));
        assert!(!map.is_reachable(Pos::new(2, 1)));
        assert!(!map.is_reachable(Pos::new(3, 1)));
    }

    #[test]
    fn test_forest_costs_two() {
        let terrain = TerrainGrid::from_rows(&[". F ."]).unwrap();
        let snapshot = SnapshotBuilder::new(3, 1)
            .terrain(terrain)
            .ally(1, Pos::new(0, 0), |u| u.stats.movement = 2)
            .build();
        let map = MovementMap::compute(&snapshot, snapshot.ally(1).unwrap());
        assert_eq!(map.cost_at(Pos::new(1, 0)), Some(2));
        assert!(!map.is_reachable(Pos::new(2, 0)));
    }

    #[test]
    fn test_range_map_covers_weapon_envelope() {
        let snapshot = SnapshotBuilder::new(5, 5)
            .ally(1, Pos::new(0, 0), |u| u.stats.movement = 0)
            .build();
        let maps = UnitMaps::compute(&snapshot, snapshot.ally(1).unwrap());
        // Default ally weapon is an iron sword: range 1 around the origin.
        assert!(maps.range.in_range(Pos::new(1, 0)));
        assert!(maps.range.in_range(Pos::new(0, 1)));
        assert!(!maps.range.in_range(Pos::new(0, 0)));
        assert!(!maps.range.in_range(Pos::new(1, 1)));
    }
}
