//! The simulated enemy phase: each visible enemy advances toward the
//! nearest ally and strikes when one is within weapon reach.

use super::battle::{resolve, unit_mut};
use emblem_core::{Allegiance, MovementMap, Pos, Snapshot, Unit, UnitId};

fn targets(state: &Snapshot) -> Vec<&Unit> {
    state
        .allies
        .iter()
        .filter(|a| a.is_alive() && !a.is_rescued())
        .collect()
}

/// Tiles the enemy may end its move on, its own tile first.
fn destinations(state: &Snapshot, enemy: &Unit) -> Vec<Pos> {
    let movement = MovementMap::compute(state, enemy);
    std::iter::once(enemy.pos)
        .chain(
            movement
                .reachable()
                .filter(|&p| p != enemy.pos && !state.is_blocked_for(p, enemy)),
        )
        .collect()
}

/// Where to stand and whom to hit, or just where to stand.
fn plan(state: &Snapshot, enemy: &Unit) -> Option<(Pos, Option<(usize, UnitId)>)> {
    let allies = targets(state);
    if allies.is_empty() {
        return None;
    }
    let tiles = destinations(state, enemy);

    // Weakest ally in reach, earliest tile on ties.
    let strike = enemy.weapons().next().and_then(|(slot, weapon)| {
        tiles
            .iter()
            .flat_map(|&tile| {
                allies
                    .iter()
                    .filter(move |a| weapon.reaches(tile.distance(a.pos)))
                    .map(move |a| (a.hp, tile, a.id))
            })
            .min_by_key(|(hp, _, _)| *hp)
            .map(|(_, tile, ally)| (tile, Some((slot, ally))))
    });
    if strike.is_some() {
        return strike;
    }

    let nearest = |tile: Pos| allies.iter().map(|a| tile.distance(a.pos)).min().unwrap_or(0);
    tiles
        .into_iter()
        .min_by_key(|&tile| (nearest(tile), tile.y, tile.x))
        .map(|tile| (tile, None))
}

pub fn run(state: &mut Snapshot) {
    let order: Vec<UnitId> = state
        .enemies
        .iter()
        .filter(|e| e.is_alive() && e.is_visible())
        .map(|e| e.id)
        .collect();

    for id in order {
        let Some(enemy) = state.enemy(id).filter(|e| e.is_alive()) else {
            continue;
        };
        let Some((tile, strike)) = plan(state, enemy) else {
            break;
        };
        if let Some(unit) = unit_mut(state, Allegiance::Enemy, id) {
            unit.pos = tile;
        }
        if let Some((slot, ally)) = strike {
            resolve(state, (Allegiance::Enemy, id), slot, (Allegiance::Ally, ally));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emblem_core::testing::SnapshotBuilder;
    use emblem_core::TurnStatus;

    #[test]
    fn test_enemy_strikes_adjacent_ally() {
        let mut state = SnapshotBuilder::new(5, 5)
            .ally(1, Pos::new(2, 2), |_| {})
            .enemy(10, Pos::new(2, 3), |_| {})
            .build();
        run(&mut state);
        assert_eq!(state.ally(1).unwrap().hp, 12);
        assert_eq!(state.enemy(10).unwrap().hp, 9);
    }

    #[test]
    fn test_enemy_advances_when_out_of_reach() {
        let mut state = SnapshotBuilder::new(12, 1)
            .ally(1, Pos::new(0, 0), |_| {})
            .enemy(10, Pos::new(11, 0), |u| u.stats.movement = 3)
            .build();
        run(&mut state);
        assert_eq!(state.enemy(10).unwrap().pos, Pos::new(8, 0));
        assert_eq!(state.ally(1).unwrap().hp, 20);
    }

    #[test]
    fn test_enemy_picks_weakest_target() {
        let mut state = SnapshotBuilder::new(5, 5)
            .ally(1, Pos::new(0, 0), |_| {})
            .ally(2, Pos::new(4, 4), |u| u.hp = 5)
            .enemy(10, Pos::new(2, 2), |_| {})
            .build();
        run(&mut state);
        assert!(!state.ally(2).unwrap().is_alive());
        assert_eq!(state.ally(1).unwrap().hp, 20);
    }

    #[test]
    fn test_carried_and_hidden_units_sit_out() {
        let mut state = SnapshotBuilder::new(5, 5)
            .ally(1, Pos::new(2, 2), |u| u.status = TurnStatus::Rescued)
            .enemy(10, Pos::new(2, 3), |u| u.status = TurnStatus::Hidden)
            .build();
        run(&mut state);
        assert_eq!(state.ally(1).unwrap().hp, 20);
        assert_eq!(state.enemy(10).unwrap().pos, Pos::new(2, 3));
    }
}
