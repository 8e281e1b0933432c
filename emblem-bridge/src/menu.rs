//! Model of the in-game menus, so the engine knows how many presses reach
//! an entry before it opens the menu.

use crate::link::Direction;
use emblem_core::{Pos, Snapshot, Unit, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    Attack,
    Item,
    Rescue,
    Wait,
}

/// Presses from the top of a wrapping list of `len` entries to `index`,
/// whichever way round is shorter.
pub fn menu_path(index: usize, len: usize) -> Vec<Direction> {
    if len == 0 || index >= len {
        return Vec::new();
    }
    let up = len - index;
    if index <= up {
        vec![Direction::Down; index]
    } else {
        vec![Direction::Up; up]
    }
}

/// The menu shown after a unit picks its destination tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMenu {
    entries: Vec<MenuEntry>,
}

impl ActionMenu {
    /// Menu for `unit` (still on its origin tile in `snapshot`) after moving
    /// to `tile`.
    pub fn at(snapshot: &Snapshot, unit: &Unit, tile: Pos) -> Self {
        let mut entries = Vec::new();
        if !Self::weapon_slots(snapshot, unit, tile).is_empty() {
            entries.push(MenuEntry::Attack);
        }
        if unit.usable_items().next().is_some() {
            entries.push(MenuEntry::Item);
        }
        if Self::carried(snapshot, unit).is_some() {
            entries.push(MenuEntry::Rescue);
        }
        entries.push(MenuEntry::Wait);
        Self { entries }
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn index_of(&self, entry: MenuEntry) -> Option<usize> {
        self.entries.iter().position(|e| *e == entry)
    }

    pub fn path_to(&self, entry: MenuEntry) -> Option<Vec<Direction>> {
        self.index_of(entry)
            .map(|index| menu_path(index, self.entries.len()))
    }

    /// The ally `unit` is carrying, if any.
    pub fn carried(snapshot: &Snapshot, unit: &Unit) -> Option<UnitId> {
        snapshot
            .allies
            .iter()
            .find(|a| a.id != unit.id && a.is_rescued() && a.is_alive() && a.pos == unit.pos)
            .map(|a| a.id)
    }

    /// Inventory slots listed in the weapon menu: usable weapons that reach
    /// at least one visible enemy from `tile`.
    pub fn weapon_slots(snapshot: &Snapshot, unit: &Unit, tile: Pos) -> Vec<usize> {
        unit.weapons()
            .filter(|(_, def)| {
                snapshot
                    .visible_enemies()
                    .any(|e| def.reaches(tile.distance(e.pos)))
            })
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Targets cycled through in target selection, in reading order.
    pub fn targets(snapshot: &Snapshot, unit: &Unit, tile: Pos, slot: usize) -> Vec<(UnitId, Pos)> {
        let Some(def) = unit.items.get(slot).and_then(|s| s.def()) else {
            return Vec::new();
        };
        let mut targets: Vec<(UnitId, Pos)> = snapshot
            .visible_enemies()
            .filter(|e| def.reaches(tile.distance(e.pos)))
            .map(|e| (e.id, e.pos))
            .collect();
        targets.sort_by_key(|(_, pos)| (pos.y, pos.x));
        targets
    }

    /// Inventory slots listed in the item menu.
    pub fn item_slots(unit: &Unit) -> Vec<usize> {
        unit.usable_items().map(|(slot, _)| slot).collect()
    }
}

/// Entries of the map menu opened from an empty tile or a spent unit.
pub const MAP_MENU: [&str; 5] = ["Unit", "Status", "Options", "Suspend", "End"];

pub fn map_menu_end_path() -> Vec<Direction> {
    menu_path(MAP_MENU.len() - 1, MAP_MENU.len())
}
