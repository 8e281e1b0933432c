use crate::state::{ItemId, Pos, TerrainModifiers, UnitId};
use serde::{Deserialize, Serialize};

/// The external process's forecast for one (attacker, defender, weapon, tile).
///
/// The forecast is ground truth: nothing here tries to model the game's RNG.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleProjection {
    pub attacker: UnitId,
    pub defender: UnitId,
    pub item: ItemId,
    /// Launch tile.
    pub tile: Pos,
    pub attack: i32,
    pub defense: i32,
    pub hit: i32,
    pub avoid: i32,
    pub crit: i32,
    /// Terrain bonuses of the launch tile.
    pub terrain: TerrainModifiers,
    pub attacker_hp_after: u8,
    pub defender_hp_after: u8,
}

impl BattleProjection {
    pub fn predicts_kill(&self) -> bool {
        self.defender_hp_after == 0
    }

    pub fn predicts_death(&self) -> bool {
        self.attacker_hp_after == 0
    }

    pub fn combat_score(&self) -> i32 {
        let t = self.terrain;
        let mut score = 0;
        if t.defense > 0 || t.avoid > 0 || t.resistance > 0 {
            score += 10 + 2 * t.defense as i32 + t.avoid as i32 + t.resistance as i32;
        }
        if self.predicts_kill() {
            score += 100;
        }
        if self.predicts_death() {
            score -= 100;
        }
        score + self.attack + self.hit / 10 + self.crit / 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection() -> BattleProjection {
        BattleProjection {
            attacker: 1,
            defender: 10,
            item: 0x01,
            tile: Pos::new(0, 0),
            attack: 11,
            defense: 4,
            hit: 87,
            avoid: 12,
            crit: 5,
            terrain: TerrainModifiers::default(),
            attacker_hp_after: 20,
            defender_hp_after: 7,
        }
    }

    #[test]
    fn test_plain_tile_score() {
        // 11 + 87/10 + 5/10
        assert_eq!(projection().combat_score(), 19);
    }

    #[test]
    fn test_terrain_kill_and_death_terms() {
        let mut p = projection();
        p.terrain = TerrainModifiers {
            defense: 1,
            avoid: 20,
            resistance: 0,
        };
        assert_eq!(p.combat_score(), 19 + 10 + 2 + 20);

        p.defender_hp_after = 0;
        assert!(p.predicts_kill());
        assert_eq!(p.combat_score(), 19 + 32 + 100);

        p.attacker_hp_after = 0;
        assert_eq!(p.combat_score(), 19 + 32);
    }
}
