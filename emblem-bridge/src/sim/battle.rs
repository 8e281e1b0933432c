//! Combat forecast and resolution for the simulated game.
//!
//! Every strike lands and nothing crits, so the forecast's HP figures are
//! exactly what resolution produces.

use emblem_core::items::ItemDef;
use emblem_core::{Allegiance, BattleProjection, Snapshot, Unit, UnitId};

/// Doubling needs this much more speed than the foe.
const DOUBLE_SPEED: u8 = 4;

/// One side of an exchange.
struct Side {
    damage: i32,
    defense: i32,
    hit: i32,
    avoid: i32,
    crit: i32,
    doubles: bool,
}

fn side(snapshot: &Snapshot, unit: &Unit, weapon: &ItemDef, foe: &Unit, foe_weapon: Option<&ItemDef>) -> Side {
    let own = snapshot.terrain.class(unit.pos).modifiers();
    let theirs = snapshot.terrain.class(foe.pos).modifiers();
    let (hit_bonus, might_bonus) = foe_weapon
        .map(|w| weapon.triangle_against(w))
        .map_or((0, 0), |t| (t.hit_bonus(), t.might_bonus()));

    let power = unit.stats.strength as i32 + weapon.might as i32 + might_bonus;
    let guard = if weapon.is_magic() {
        foe.stats.resistance as i32 + theirs.resistance as i32
    } else {
        foe.stats.defense as i32 + theirs.defense as i32
    };
    let accuracy =
        weapon.hit as i32 + 2 * unit.stats.skill as i32 + unit.stats.luck as i32 / 2 + hit_bonus;
    let foe_avoid = 2 * foe.stats.speed as i32 + foe.stats.luck as i32 + theirs.avoid as i32;

    Side {
        damage: (power - guard).max(0),
        defense: unit.stats.defense as i32 + own.defense as i32,
        hit: (accuracy - foe_avoid).clamp(0, 100),
        avoid: 2 * unit.stats.speed as i32 + unit.stats.luck as i32 + own.avoid as i32,
        crit: (weapon.crit as i32 + unit.stats.skill as i32 / 2 - foe.stats.luck as i32).clamp(0, 100),
        doubles: unit.stats.speed >= foe.stats.speed.saturating_add(DOUBLE_SPEED),
    }
}

/// Forecast `attacker` striking `defender` from its current tile with the
/// weapon in `slot`.
pub fn forecast(snapshot: &Snapshot, attacker: &Unit, slot: usize, defender: &Unit) -> Option<BattleProjection> {
    let weapon = attacker.items.get(slot)?.def().filter(|d| d.is_weapon())?;
    let distance = attacker.pos.distance(defender.pos);
    if !weapon.reaches(distance) {
        return None;
    }
    let counter_weapon = defender.equipped_weapon().filter(|w| w.reaches(distance));

    let offense = side(snapshot, attacker, weapon, defender, counter_weapon);
    let counter = counter_weapon.map(|w| side(snapshot, defender, w, attacker, Some(weapon)));

    let mut hp_attacker = attacker.hp as i32;
    let mut hp_defender = defender.hp as i32;
    hp_defender -= offense.damage;
    if let Some(counter) = &counter {
        if hp_defender > 0 {
            hp_attacker -= counter.damage;
        }
    }
    if hp_attacker > 0 && hp_defender > 0 {
        if offense.doubles {
            hp_defender -= offense.damage;
        } else if let Some(counter) = counter.as_ref().filter(|c| c.doubles) {
            hp_attacker -= counter.damage;
        }
    }

    Some(BattleProjection {
        attacker: attacker.id,
        defender: defender.id,
        item: weapon.id,
        tile: attacker.pos,
        attack: offense.damage,
        defense: offense.defense,
        hit: offense.hit,
        avoid: offense.avoid,
        crit: offense.crit,
        terrain: snapshot.terrain.class(attacker.pos).modifiers(),
        attacker_hp_after: hp_attacker.max(0) as u8,
        defender_hp_after: hp_defender.max(0) as u8,
    })
}

pub(crate) fn unit_mut(state: &mut Snapshot, allegiance: Allegiance, id: UnitId) -> Option<&mut Unit> {
    let units = match allegiance {
        Allegiance::Ally => &mut state.allies,
        Allegiance::Enemy => &mut state.enemies,
    };
    units.iter_mut().find(|u| u.id == id)
}

/// Play out the exchange and write the HP results back into `state`.
pub fn resolve(
    state: &mut Snapshot,
    attacker: (Allegiance, UnitId),
    slot: usize,
    defender: (Allegiance, UnitId),
) -> Option<BattleProjection> {
    let a = state.unit(attacker.0, attacker.1)?;
    let d = state.unit(defender.0, defender.1)?;
    let projection = forecast(state, a, slot, d)?;

    if let Some(unit) = unit_mut(state, attacker.0, attacker.1) {
        unit.hp = projection.attacker_hp_after;
        if let Some(weapon) = unit.items.get_mut(slot) {
            weapon.uses = weapon.uses.saturating_sub(1);
        }
    }
    if let Some(unit) = unit_mut(state, defender.0, defender.1) {
        unit.hp = projection.defender_hp_after;
    }
    log::debug!(
        "{:?} {} hit {:?} {}: hp {} / {}",
        attacker.0,
        attacker.1,
        defender.0,
        defender.1,
        projection.attacker_hp_after,
        projection.defender_hp_after
    );
    Some(projection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emblem_core::items::{FIRE, IRON_BOW};
    use emblem_core::testing::SnapshotBuilder;
    use emblem_core::{InventorySlot, Pos, TerrainGrid};

    #[test]
    fn test_sword_against_axe() {
        let snapshot = SnapshotBuilder::new(4, 4)
            .ally(1, Pos::new(1, 1), |_| {})
            .enemy(10, Pos::new(1, 2), |_| {})
            .build();
        let p = forecast(&snapshot, snapshot.ally(1).unwrap(), 0, snapshot.enemy(10).unwrap()).unwrap();
        // 6 str + 5 might + 1 triangle - 3 def
        assert_eq!(p.attack, 9);
        assert_eq!(p.defender_hp_after, 9);
        // 5 str + 8 might - 1 triangle - 4 def
        assert_eq!(p.attacker_hp_after, 12);
        assert!(!p.predicts_kill());
    }

    #[test]
    fn test_no_counter_out_of_reach() {
        let snapshot = SnapshotBuilder::new(4, 4)
            .ally(1, Pos::new(0, 0), |u| u.items = vec![InventorySlot::new(IRON_BOW, 30)])
            .enemy(10, Pos::new(0, 2), |_| {})
            .build();
        let p = forecast(&snapshot, snapshot.ally(1).unwrap(), 0, snapshot.enemy(10).unwrap()).unwrap();
        assert_eq!(p.attacker_hp_after, 20);
        // 6 + 6 - 3, single strike
        assert_eq!(p.defender_hp_after, 9);
    }

    #[test]
    fn test_doubling_and_kill() {
        let snapshot = SnapshotBuilder::new(4, 4)
            .ally(1, Pos::new(1, 1), |u| u.stats.speed = 9)
            .enemy(10, Pos::new(2, 1), |_| {})
            .build();
        let p = forecast(&snapshot, snapshot.ally(1).unwrap(), 0, snapshot.enemy(10).unwrap()).unwrap();
        assert!(p.predicts_kill());
        assert_eq!(p.attacker_hp_after, 12);
    }

    #[test]
    fn test_magic_uses_resistance_and_terrain() {
        let terrain = TerrainGrid::from_rows(&[". . .", ". F .", ". . ."]).unwrap();
        let snapshot = SnapshotBuilder::new(3, 3)
            .terrain(terrain)
            .ally(1, Pos::new(1, 1), |u| u.items = vec![InventorySlot::new(FIRE, 30)])
            .enemy(10, Pos::new(1, 2), |_| {})
            .build();
        let p = forecast(&snapshot, snapshot.ally(1).unwrap(), 0, snapshot.enemy(10).unwrap()).unwrap();
        // 6 + 5 - 0 resistance
        assert_eq!(p.attack, 11);
        assert_eq!(p.terrain.avoid, 20);
        assert_eq!(p.defense, 5);
    }

    #[test]
    fn test_resolve_writes_back() {
        let mut state = SnapshotBuilder::new(4, 4)
            .ally(1, Pos::new(1, 1), |_| {})
            .enemy(10, Pos::new(1, 2), |_| {})
            .build();
        let p = resolve(&mut state, (Allegiance::Ally, 1), 0, (Allegiance::Enemy, 10)).unwrap();
        assert_eq!(state.enemy(10).unwrap().hp, p.defender_hp_after);
        assert_eq!(state.ally(1).unwrap().hp, p.attacker_hp_after);
        assert_eq!(state.ally(1).unwrap().items[0].uses, 39);
    }
}
