//! Static item catalog.
//!
//! Item ids follow the game's internal numbering. Unknown ids are treated as
//! inert: they never produce attack or item actions.

use crate::state::ItemId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Sword,
    Lance,
    Axe,
    Bow,
    Anima,
    Light,
    Dark,
    Staff,
    Consumable,
}

impl ItemKind {
    pub fn is_magic(self) -> bool {
        matches!(self, Self::Anima | Self::Light | Self::Dark)
    }
}

/// Outcome of the weapon triangle from the attacker's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triangle {
    Advantage,
    Neutral,
    Disadvantage,
}

impl Triangle {
    pub fn hit_bonus(self) -> i32 {
        match self {
            Self::Advantage => 15,
            Self::Neutral => 0,
            Self::Disadvantage => -15,
        }
    }

    pub fn might_bonus(self) -> i32 {
        match self {
            Self::Advantage => 1,
            Self::Neutral => 0,
            Self::Disadvantage => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemDef {
    pub id: ItemId,
    pub name: &'static str,
    pub kind: ItemKind,
    /// Inclusive attack range, `None` for non-weapons.
    pub range: Option<(u32, u32)>,
    pub might: u8,
    pub hit: u8,
    pub crit: u8,
    pub heal: u8,
}

impl ItemDef {
    pub fn is_weapon(&self) -> bool {
        self.range.is_some()
    }

    pub fn is_consumable(&self) -> bool {
        self.kind == ItemKind::Consumable
    }

    pub fn heals(&self) -> bool {
        self.heal > 0
    }

    pub fn is_magic(&self) -> bool {
        self.kind.is_magic()
    }

    /// Whether a target `distance` tiles away is inside the range envelope.
    pub fn reaches(&self, distance: u32) -> bool {
        self.range
            .is_some_and(|(min, max)| (min..=max).contains(&distance))
    }

    /// Weapon triangle (sword > axe > lance > sword) and the magic trinity
    /// (anima > light > dark > anima). Everything else is neutral.
    pub fn triangle_against(&self, other: &ItemDef) -> Triangle {
        use ItemKind::*;
        match (self.kind, other.kind) {
            (Sword, Axe) | (Axe, Lance) | (Lance, Sword) => Triangle::Advantage,
            (Anima, Light) | (Light, Dark) | (Dark, Anima) => Triangle::Advantage,
            (Axe, Sword) | (Lance, Axe) | (Sword, Lance) => Triangle::Disadvantage,
            (Light, Anima) | (Dark, Light) | (Anima, Dark) => Triangle::Disadvantage,
            _ => Triangle::Neutral,
        }
    }
}

const fn weapon(
    id: ItemId,
    name: &'static str,
    kind: ItemKind,
    range: (u32, u32),
    might: u8,
    hit: u8,
    crit: u8,
) -> ItemDef {
    ItemDef {
        id,
        name,
        kind,
        range: Some(range),
        might,
        hit,
        crit,
        heal: 0,
    }
}

const fn consumable(id: ItemId, name: &'static str, heal: u8) -> ItemDef {
    ItemDef {
        id,
        name,
        kind: ItemKind::Consumable,
        range: None,
        might: 0,
        hit: 0,
        crit: 0,
        heal,
    }
}

pub const IRON_SWORD: ItemId = 0x01;
pub const SLIM_SWORD: ItemId = 0x02;
pub const STEEL_SWORD: ItemId = 0x03;
pub const RAPIER: ItemId = 0x09;
pub const IRON_LANCE: ItemId = 0x14;
pub const JAVELIN: ItemId = 0x1B;
pub const IRON_AXE: ItemId = 0x1F;
pub const HAND_AXE: ItemId = 0x26;
pub const IRON_BOW: ItemId = 0x2D;
pub const LONGBOW: ItemId = 0x33;
pub const FIRE: ItemId = 0x38;
pub const LIGHTNING: ItemId = 0x3F;
pub const FLUX: ItemId = 0x45;
pub const HEAL: ItemId = 0x4B;
pub const VULNERARY: ItemId = 0x6C;
pub const ELIXIR: ItemId = 0x6D;
pub const DOOR_KEY: ItemId = 0x78;

static CATALOG: &[ItemDef] = &[
    weapon(IRON_SWORD, "Iron Sword", ItemKind::Sword, (1, 1), 5, 90, 0),
    weapon(SLIM_SWORD, "Slim Sword", ItemKind::Sword, (1, 1), 3, 100, 5),
    weapon(STEEL_SWORD, "Steel Sword", ItemKind::Sword, (1, 1), 8, 75, 0),
    weapon(RAPIER, "Rapier", ItemKind::Sword, (1, 1), 7, 95, 10),
    weapon(IRON_LANCE, "Iron Lance", ItemKind::Lance, (1, 1), 7, 80, 0),
    weapon(JAVELIN, "Javelin", ItemKind::Lance, (1, 2), 6, 65, 0),
    weapon(IRON_AXE, "Iron Axe", ItemKind::Axe, (1, 1), 8, 75, 0),
    weapon(HAND_AXE, "Hand Axe", ItemKind::Axe, (1, 2), 7, 60, 0),
    weapon(IRON_BOW, "Iron Bow", ItemKind::Bow, (2, 2), 6, 85, 0),
    weapon(LONGBOW, "Longbow", ItemKind::Bow, (2, 3), 5, 65, 0),
    weapon(FIRE, "Fire", ItemKind::Anima, (1, 2), 5, 90, 0),
    weapon(LIGHTNING, "Lightning", ItemKind::Light, (1, 2), 4, 95, 5),
    weapon(FLUX, "Flux", ItemKind::Dark, (1, 2), 7, 80, 0),
    ItemDef {
        id: HEAL,
        name: "Heal",
        kind: ItemKind::Staff,
        range: None,
        might: 0,
        hit: 0,
        crit: 0,
        heal: 10,
    },
    consumable(VULNERARY, "Vulnerary", 10),
    consumable(ELIXIR, "Elixir", 60),
    consumable(DOOR_KEY, "Door Key", 0),
];

pub fn lookup(id: ItemId) -> Option<&'static ItemDef> {
    CATALOG.iter().find(|def| def.id == id)
}

pub fn catalog() -> &'static [ItemDef] {
    CATALOG
}
