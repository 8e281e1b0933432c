//! Legal action enumeration for one unit.

use crate::action::Action;
use crate::maps::{MovementMap, UnitMaps};
use crate::state::{Pos, Snapshot, Unit};
use std::collections::HashSet;

pub struct ActionEnumerator<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> ActionEnumerator<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    /// Every legal action for `unit`, de-duplicated. Empty if the unit cannot act.
    ///
    /// Without maps, moves fall back to a Manhattan-distance diamond and
    /// attacks are only considered from the unit's current tile.
    pub fn enumerate(&self, unit: &Unit, maps: Option<&UnitMaps>) -> Vec<Action> {
        if !unit.can_act() {
            return Vec::new();
        }
        let mut actions = self.moves(unit, maps.map(|m| &m.movement));
        actions.extend(self.attacks(unit, maps));
        actions.extend(self.rescues(unit));
        actions.extend(self.items(unit));
        actions
    }

    pub fn moves(&self, unit: &Unit, movement: Option<&MovementMap>) -> Vec<Action> {
        self.snapshot
            .terrain
            .positions()
            .filter(|&p| match movement {
                Some(map) => map.is_reachable(p),
                None => unit.pos.distance(p) <= unit.movement(),
            })
            .filter(|&p| !self.snapshot.is_blocked_for(p, unit))
            .map(|p| Action::move_to(unit, p))
            .collect()
    }

    pub fn attacks(&self, unit: &Unit, maps: Option<&UnitMaps>) -> Vec<Action> {
        let launch_tiles: Vec<Pos> = match maps {
            Some(maps) => std::iter::once(unit.pos)
                .chain(
                    maps.movement
                        .reachable()
                        .filter(|&p| p != unit.pos && !self.snapshot.is_blocked_for(p, unit)),
                )
                .collect(),
            None => vec![unit.pos],
        };

        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for (slot, weapon) in unit.weapons() {
            for enemy in self.snapshot.visible_enemies() {
                for &from in &launch_tiles {
                    if !weapon.reaches(from.distance(enemy.pos)) {
                        continue;
                    }
                    if seen.insert((enemy.id, weapon.id, from)) {
                        actions.push(Action::attack(unit, from, enemy.id, slot, weapon.id));
                    }
                }
            }
        }
        actions
    }

    /// One action per carried ally sharing the unit's tile.
    pub fn rescues(&self, unit: &Unit) -> Vec<Action> {
        self.snapshot
            .allies
            .iter()
            .filter(|a| a.id != unit.id && a.is_alive() && a.is_rescued() && a.pos == unit.pos)
            .map(|a| Action::rescue(unit, a.id))
            .collect()
    }

    /// Consumables only; healing items require missing HP.
    pub fn items(&self, unit: &Unit) -> Vec<Action> {
        unit.usable_items()
            .filter_map(|(slot, inv)| inv.def().map(|def| (slot, def)))
            .filter(|(_, def)| def.is_consumable())
            .filter(|(_, def)| !def.heals() || unit.hp < unit.max_hp)
            .map(|(slot, def)| Action::use_item(unit, slot, def.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::items;
    use crate::state::{InventorySlot, TurnStatus};
    use crate::testing::SnapshotBuilder;
    use proptest::prelude::*;

    fn count(actions: &[Action], kind: ActionKind) -> usize {
        actions.iter().filter(|a| a.kind == kind).count()
    }

    #[test]
    fn test_launch_tiles_adjacent_to_enemy() {
        let snapshot = SnapshotBuilder::new(5, 5)
            .ally(1, Pos::new(2, 2), |u| u.stats.movement = 2)
            .enemy(10, Pos::new(2, 4), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        let maps = UnitMaps::compute(&snapshot, unit);
        let attacks = ActionEnumerator::new(&snapshot).attacks(unit, Some(&maps));

        assert!(!attacks.is_empty());
        for attack in &attacks {
            assert_eq!(attack.target.distance(Pos::new(2, 4)), 1, "{}", attack);
            assert_eq!(attack.target_unit, Some(10));
        }
        // (1,4) and (3,4) are three steps away, out of reach with 2 movement.
        let tiles: HashSet<Pos> = attacks.iter().map(|a| a.target).collect();
        assert_eq!(tiles, HashSet::from([Pos::new(2, 3)]));
    }

    #[test]
    fn test_cannot_act_yields_nothing() {
        let snapshot = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(0, 0), |u| u.status = TurnStatus::Acted)
            .build();
        let unit = snapshot.ally(1).unwrap();
        assert!(ActionEnumerator::new(&snapshot).enumerate(unit, None).is_empty());
    }

    #[test]
    fn test_no_items_still_moves() {
        let snapshot = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(1, 1), |u| u.items.clear())
            .enemy(10, Pos::new(1, 2), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        let actions = ActionEnumerator::new(&snapshot).enumerate(unit, None);
        assert_eq!(count(&actions, ActionKind::Attack), 0);
        assert_eq!(count(&actions, ActionKind::UseItem), 0);
        assert!(count(&actions, ActionKind::Move) > 0);
    }

    #[test]
    fn test_spent_weapon_is_ignored() {
        let snapshot = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(1, 1), |u| u.items[0].uses = 0)
            .enemy(10, Pos::new(1, 2), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        assert!(ActionEnumerator::new(&snapshot).attacks(unit, None).is_empty());
    }

    #[test]
    fn test_hidden_and_dead_enemies_are_not_targets() {
        let snapshot = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(1, 1), |_| {})
            .enemy(10, Pos::new(1, 2), |u| u.status = TurnStatus::Hidden)
            .enemy(11, Pos::new(1, 0), |u| u.hp = 0)
            .build();
        let unit = snapshot.ally(1).unwrap();
        assert!(ActionEnumerator::new(&snapshot).attacks(unit, None).is_empty());
    }

    #[test]
    fn test_healing_items_need_missing_hp() {
        let build = |hp| {
            SnapshotBuilder::new(3, 3)
                .ally(1, Pos::new(0, 0), |u| {
                    u.hp = hp;
                    u.items.push(InventorySlot::new(items::VULNERARY, 3));
                    u.items.push(InventorySlot::new(items::DOOR_KEY, 1));
                })
                .build()
        };

        let full = build(20);
        let actions = ActionEnumerator::new(&full).items(full.ally(1).unwrap());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].item, Some(items::DOOR_KEY));

        let hurt = build(9);
        let actions = ActionEnumerator::new(&hurt).items(hurt.ally(1).unwrap());
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].slot, Some(1));
    }

    #[test]
    fn test_rescue_per_carried_ally() {
        let snapshot = SnapshotBuilder::new(3, 3)
            .ally(1, Pos::new(1, 1), |u| u.status = TurnStatus::Rescuing)
            .ally(2, Pos::new(1, 1), |u| u.status = TurnStatus::Rescued)
            .ally(3, Pos::new(0, 0), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        let rescues = ActionEnumerator::new(&snapshot).rescues(unit);
        assert_eq!(rescues.len(), 1);
        assert_eq!(rescues[0].target_unit, Some(2));
    }

    #[test]
    fn test_occupied_cells_excluded_from_moves() {
        let snapshot = SnapshotBuilder::new(3, 1)
            .ally(1, Pos::new(0, 0), |_| {})
            .ally(2, Pos::new(1, 0), |_| {})
            .build();
        let unit = snapshot.ally(1).unwrap();
        let targets: Vec<Pos> = ActionEnumerator::new(&snapshot)
            .moves(unit, None)
            .into_iter()
            .map(|a| a.target)
            .collect();
        assert_eq!(targets, vec![Pos::new(0, 0), Pos::new(2, 0)]);
    }

    proptest! {
        #[test]
        fn prop_empty_board_moves_form_clipped_diamond(
            width in 1u32..10,
            height in 1u32..10,
            x in 0i32..10,
            y in 0i32..10,
            movement in 0u8..8,
        ) {
            let origin = Pos::new(x % width as i32, y % height as i32);
            let snapshot = SnapshotBuilder::new(width, height)
                .ally(1, origin, |u| u.stats.movement = movement)
                .build();
            let unit = snapshot.ally(1).unwrap();
            let moves = ActionEnumerator::new(&snapshot).moves(unit, None);

            let expected = snapshot
                .terrain
                .positions()
                .filter(|p| origin.distance(*p) <= movement as u32)
                .count();
            prop_assert_eq!(moves.len(), expected);
            prop_assert!(moves.iter().any(|a| a.is_noop()));
        }

        #[test]
        fn prop_attack_triples_unique_and_stable(
            ex in 0i32..6,
            ey in 0i32..6,
            movement in 0u8..5,
            with_bow in any::<bool>(),
        ) {
            let enemy_pos = Pos::new(ex, ey);
            prop_assume!(enemy_pos != Pos::new(2, 2));
            let snapshot = SnapshotBuilder::new(6, 6)
                .ally(1, Pos::new(2, 2), |u| {
                    u.stats.movement = movement;
                    if with_bow {
                        u.items.push(InventorySlot::new(items::LONGBOW, 10));
                    }
                    u.items.push(InventorySlot::new(items::IRON_SWORD, 10));
                })
                .enemy(10, enemy_pos, |_| {})
                .build();
            let unit = snapshot.ally(1).unwrap();
            let maps = UnitMaps::compute(&snapshot, unit);
            let enumerator = ActionEnumerator::new(&snapshot);

            let first = enumerator.attacks(unit, Some(&maps));
            let keys: Vec<_> = first.iter().filter_map(Action::attack_key).collect();
            let unique: HashSet<_> = keys.iter().copied().collect();
            prop_assert_eq!(keys.len(), unique.len());

            let second = enumerator.attacks(unit, Some(&maps));
            prop_assert_eq!(first, second);
        }
    }
}
