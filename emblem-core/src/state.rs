use crate::items::{self, ItemDef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub type UnitId = u8;
pub type ItemId = u8;

/// Hidden-status byte carried by enemies that only exist to drop an item.
pub const ITEM_DROPPER_HIDDEN_STATUS: u8 = 0x20;

/// A tile coordinate on the map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance.
    pub fn distance(self, other: Pos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn neighbors(self) -> [Pos; 4] {
        [
            Pos::new(self.x, self.y - 1),
            Pos::new(self.x, self.y + 1),
            Pos::new(self.x - 1, self.y),
            Pos::new(self.x + 1, self.y),
        ]
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Allegiance {
    Ally,
    Enemy,
}

/// Whether a unit may still act this phase.
///
/// The external process reports this as a status byte whose values overlap
/// across game revisions. Internally it is a closed set with one canonical
/// byte per variant; [`TurnStatus::from_code`] folds the legacy variants in.
/// Serialized as the status byte; unknown bytes fail to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TurnStatus {
    #[default]
    NotActed,
    Acted,
    /// Carried by another unit.
    Rescued,
    /// Carrying another unit; may still act.
    Rescuing,
    /// Under a roof or otherwise not visible.
    Hidden,
}

impl TurnStatus {
    pub const fn code(self) -> u8 {
        match self {
            Self::NotActed => 0x00,
            Self::Acted => 0x42,
            Self::Rescued => 0x21,
            Self::Rescuing => 0x10,
            Self::Hidden => 0x81,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::NotActed),
            // "moved" and "rescuer, moved" both mean the unit is spent
            0x02 | 0x42 | 0x52 => Some(Self::Acted),
            0x21 => Some(Self::Rescued),
            0x10 => Some(Self::Rescuing),
            0x81 => Some(Self::Hidden),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotActed => "not acted",
            Self::Acted => "acted",
            Self::Rescued => "rescued",
            Self::Rescuing => "rescuing",
            Self::Hidden => "hidden",
        }
    }
}

impl TryFrom<u8> for TurnStatus {
    type Error = StateError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(StateError::UnknownTurnStatus(code))
    }
}

impl From<TurnStatus> for u8 {
    fn from(status: TurnStatus) -> u8 {
        status.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub strength: u8,
    pub skill: u8,
    pub speed: u8,
    pub luck: u8,
    pub defense: u8,
    pub resistance: u8,
    pub movement: u8,
    pub level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub item: ItemId,
    pub uses: u8,
}

impl InventorySlot {
    pub fn new(item: ItemId, uses: u8) -> Self {
        Self { item, uses }
    }

    /// Catalog entry, if the item is known.
    pub fn def(&self) -> Option<&'static ItemDef> {
        items::lookup(self.item)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub allegiance: Allegiance,
    pub pos: Pos,
    pub hp: u8,
    pub max_hp: u8,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub items: Vec<InventorySlot>,
    #[serde(default)]
    pub status: TurnStatus,
    #[serde(default)]
    pub hidden_status: u8,
}

impl Unit {
    pub fn new(
        id: UnitId,
        name: impl Into<String>,
        allegiance: Allegiance,
        pos: Pos,
        hp: u8,
        max_hp: u8,
    ) -> Result<Self, StateError> {
        let unit = Self {
            id,
            name: name.into(),
            allegiance,
            pos,
            hp,
            max_hp,
            stats: Stats::default(),
            items: Vec::new(),
            status: TurnStatus::NotActed,
            hidden_status: 0,
        };
        unit.validate()?;
        Ok(unit)
    }

    pub fn validate(&self) -> Result<(), StateError> {
        if self.hp > self.max_hp {
            return Err(StateError::HpExceedsMax {
                unit: self.id,
                hp: self.hp,
                max_hp: self.max_hp,
            });
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_enemy(&self) -> bool {
        self.allegiance == Allegiance::Enemy
    }

    pub fn is_visible(&self) -> bool {
        self.status != TurnStatus::Hidden
    }

    pub fn is_rescued(&self) -> bool {
        self.status == TurnStatus::Rescued
    }

    pub fn has_acted(&self) -> bool {
        self.status == TurnStatus::Acted
    }

    /// Alive and neither spent, carried nor hidden.
    pub fn can_act(&self) -> bool {
        self.is_alive() && matches!(self.status, TurnStatus::NotActed | TurnStatus::Rescuing)
    }

    pub fn movement(&self) -> u32 {
        self.stats.movement as u32
    }

    pub fn health_ratio(&self) -> f32 {
        if self.max_hp == 0 {
            0.0
        } else {
            self.hp as f32 / self.max_hp as f32
        }
    }

    /// Inventory slots with uses left, with their slot index.
    pub fn usable_items(&self) -> impl Iterator<Item = (usize, &InventorySlot)> {
        self.items.iter().enumerate().filter(|(_, slot)| slot.uses > 0)
    }

    /// Usable weapons in inventory order.
    pub fn weapons(&self) -> impl Iterator<Item = (usize, &'static ItemDef)> + '_ {
        self.usable_items()
            .filter_map(|(idx, slot)| slot.def().filter(|def| def.is_weapon()).map(|def| (idx, def)))
    }

    /// First usable weapon, which the game treats as equipped.
    pub fn equipped_weapon(&self) -> Option<&'static ItemDef> {
        self.weapons().next().map(|(_, def)| def)
    }
}

/// Terrain classification derived from the map symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    Plain,
    Forest,
    Hill,
    Fort,
    /// Gates and thrones.
    Stronghold,
    Mountain,
    Water,
    Wall,
    Hazard,
}

/// Terrain bonuses granted to a unit standing on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerrainModifiers {
    pub defense: i8,
    pub avoid: i8,
    pub resistance: i8,
}

impl TerrainClass {
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "F" => Self::Forest,
            "^" => Self::Hill,
            "C" | "0C" | "0D" | "11" => Self::Fort,
            "T" | "0A" | "0B" | "1F" => Self::Stronghold,
            "M" => Self::Mountain,
            "~" => Self::Water,
            "#" => Self::Wall,
            "1A" | "12" => Self::Hazard,
            _ => Self::Plain,
        }
    }

    /// Movement points to enter the tile, `None` if impassable on foot.
    pub fn move_cost(self) -> Option<u32> {
        match self {
            Self::Plain | Self::Stronghold => Some(1),
            Self::Forest | Self::Hill | Self::Fort => Some(2),
            Self::Hazard => Some(3),
            Self::Mountain => Some(4),
            Self::Water | Self::Wall => None,
        }
    }

    /// Coarse cost bucket used as a scoring feature.
    pub fn feature_cost(self) -> f32 {
        match self {
            Self::Forest | Self::Hill => 2.0,
            Self::Water | Self::Mountain => 3.0,
            _ => 1.0,
        }
    }

    /// Tiles worth probing from: anything granting a defensive bonus.
    pub fn is_defensive(self) -> bool {
        matches!(self, Self::Forest | Self::Hill | Self::Fort | Self::Stronghold)
    }

    pub fn position_value(self) -> f32 {
        match self {
            Self::Forest | Self::Hill => 0.5,
            Self::Fort => 0.75,
            Self::Stronghold => 1.0,
            _ => 0.0,
        }
    }

    pub fn modifiers(self) -> TerrainModifiers {
        let (defense, avoid, resistance) = match self {
            Self::Forest => (1, 20, 0),
            Self::Hill => (1, 30, 0),
            Self::Fort => (2, 20, 0),
            Self::Stronghold => (3, 30, 5),
            Self::Mountain => (2, 40, 0),
            _ => (0, 0, 0),
        };
        TerrainModifiers {
            defense,
            avoid,
            resistance,
        }
    }

    /// Reward adjustment for ending a move on this terrain.
    pub fn reward_bonus(self) -> f32 {
        match self {
            Self::Forest | Self::Hill | Self::Fort => 5.0,
            Self::Stronghold => 10.0,
            Self::Wall | Self::Mountain | Self::Hazard => -10.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGrid {
    pub width: u32,
    pub height: u32,
    /// Row-major terrain symbols.
    pub cells: Vec<String>,
    #[serde(default)]
    pub legend: BTreeMap<String, String>,
}

impl TerrainGrid {
    pub fn new(
        width: u32,
        height: u32,
        cells: Vec<String>,
        legend: BTreeMap<String, String>,
    ) -> Result<Self, StateError> {
        let grid = Self {
            width,
            height,
            cells,
            legend,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// A grid where every tile carries the same symbol.
    pub fn filled(width: u32, height: u32, symbol: &str) -> Self {
        Self {
            width,
            height,
            cells: vec![symbol.to_string(); width as usize * height as usize],
            legend: BTreeMap::new(),
        }
    }

    /// Build from whitespace-separated rows, as the map dump prints them.
    pub fn from_rows(rows: &[&str]) -> Result<Self, StateError> {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.split_whitespace().count()).unwrap_or(0) as u32;
        let cells = rows
            .iter()
            .flat_map(|row| row.split_whitespace().map(str::to_string))
            .collect();
        Self::new(width, height, cells, BTreeMap::new())
    }

    /// Tile count, or None when it does not fit in memory.
    pub fn area(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    pub fn validate(&self) -> Result<(), StateError> {
        let expected = self.area().ok_or(StateError::TerrainTooLarge {
            width: self.width,
            height: self.height,
        })?;
        if self.cells.len() != expected {
            return Err(StateError::TerrainSize {
                expected,
                actual: self.cells.len(),
            });
        }
        Ok(())
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    pub fn symbol(&self, pos: Pos) -> Option<&str> {
        if !self.in_bounds(pos) {
            return None;
        }
        let idx = pos.y as usize * self.width as usize + pos.x as usize;
        self.cells.get(idx).map(String::as_str)
    }

    /// Out-of-bounds tiles classify as walls.
    pub fn class(&self, pos: Pos) -> TerrainClass {
        self.symbol(pos)
            .map(TerrainClass::from_symbol)
            .unwrap_or(TerrainClass::Wall)
    }

    pub fn describe(&self, pos: Pos) -> Option<&str> {
        self.symbol(pos)
            .and_then(|s| self.legend.get(s))
            .map(String::as_str)
    }

    /// All tiles, row by row.
    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| Pos::new(x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Ally,
    Neutral,
    Enemy,
}

/// One polling cycle's view of the external game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub turn: u32,
    pub chapter: u8,
    pub phase: Phase,
    pub cursor: Pos,
    pub terrain: TerrainGrid,
    pub allies: Vec<Unit>,
    pub enemies: Vec<Unit>,
}

impl Snapshot {
    /// Parse and validate a JSON snapshot (scenario files, decision records).
    pub fn from_json(text: &str) -> Result<Self, StateError> {
        let snapshot: Snapshot = serde_json::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), StateError> {
        self.terrain.validate()?;
        for (list, allegiance) in [(&self.allies, Allegiance::Ally), (&self.enemies, Allegiance::Enemy)] {
            let mut seen = BTreeSet::new();
            for unit in list {
                unit.validate()?;
                if unit.allegiance != allegiance {
                    return Err(StateError::AllegianceMismatch { unit: unit.id });
                }
                if !seen.insert(unit.id) {
                    return Err(StateError::DuplicateUnit { unit: unit.id });
                }
            }
        }
        Ok(())
    }

    pub fn ally(&self, id: UnitId) -> Option<&Unit> {
        self.allies.iter().find(|u| u.id == id)
    }

    pub fn enemy(&self, id: UnitId) -> Option<&Unit> {
        self.enemies.iter().find(|u| u.id == id)
    }

    pub fn unit(&self, allegiance: Allegiance, id: UnitId) -> Option<&Unit> {
        match allegiance {
            Allegiance::Ally => self.ally(id),
            Allegiance::Enemy => self.enemy(id),
        }
    }

    /// The living unit standing on `pos`. Carried units share their carrier's
    /// tile and are never reported as the occupant.
    pub fn occupant(&self, pos: Pos) -> Option<&Unit> {
        self.allies
            .iter()
            .chain(self.enemies.iter())
            .find(|u| u.pos == pos && u.is_alive() && !u.is_rescued())
    }

    /// Whether `pos` holds a unit other than `unit`.
    pub fn is_blocked_for(&self, pos: Pos, unit: &Unit) -> bool {
        self.occupant(pos)
            .is_some_and(|o| !(o.id == unit.id && o.allegiance == unit.allegiance))
    }

    pub fn living_enemies(&self) -> impl Iterator<Item = &Unit> {
        self.enemies.iter().filter(|e| e.is_alive())
    }

    pub fn visible_enemies(&self) -> impl Iterator<Item = &Unit> {
        self.living_enemies().filter(|e| e.is_visible())
    }

    /// Allies that may still act this phase.
    pub fn ready_units(&self) -> impl Iterator<Item = &Unit> {
        self.allies.iter().filter(|u| u.can_act())
    }
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("unit {unit} has {hp} HP but max HP {max_hp}")]
    HpExceedsMax { unit: UnitId, hp: u8, max_hp: u8 },
    #[error("terrain grid has {actual} cells, expected {expected}")]
    TerrainSize { expected: usize, actual: usize },
    #[error("unit {unit} is listed under the wrong side")]
    AllegianceMismatch { unit: UnitId },
    #[error("unit {unit} appears twice on the same side")]
    DuplicateUnit { unit: UnitId },
    #[error("terrain of {width}x{height} tiles is too large")]
    TerrainTooLarge { width: u32, height: u32 },
    #[error("unknown turn-status code 0x{0:02X}")]
    UnknownTurnStatus(u8),
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}
