//! Scalar training signal from the change between two snapshots.

use crate::action::{Action, ActionKind};
use crate::outcome::{critical_unit_dead, level_beaten};
use crate::state::{Snapshot, Unit, UnitId};
use serde::{Deserialize, Serialize};

/// Reward terms. Penalties are stored as positive magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    pub enemy_killed: f32,
    pub ally_killed: f32,
    pub enemy_hp: f32,
    pub ally_hp: f32,
    pub attack: f32,
    pub item: f32,
    pub rescue: f32,
    pub wait: f32,
    /// Staying on the origin tile without killing anything.
    pub stationary: f32,
    /// Waiting while badly hurt next to a living enemy.
    pub exposed_wait: f32,
    pub exposed_hp_ratio: f32,
    pub exposed_radius: u32,
    /// The actor does not show as acted afterwards.
    pub not_acted: f32,
    pub victory: f32,
    pub defeat: f32,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            enemy_killed: 100.0,
            ally_killed: 100.0,
            enemy_hp: 10.0,
            ally_hp: 10.0,
            attack: 70.0,
            item: 2.0,
            rescue: 1.0,
            wait: 2.0,
            stationary: 10.0,
            exposed_wait: 10.0,
            exposed_hp_ratio: 0.3,
            exposed_radius: 2,
            not_acted: 20.0,
            victory: 5000.0,
            defeat: 5000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewardEstimator {
    weights: RewardWeights,
    protected: Vec<UnitId>,
}

impl RewardEstimator {
    pub fn new(weights: RewardWeights, protected: Vec<UnitId>) -> Self {
        Self { weights, protected }
    }

    /// Reward for `action` taking the game from `before` to `after`.
    pub fn estimate(&self, before: &Snapshot, action: Option<&Action>, after: &Snapshot) -> f32 {
        let w = &self.weights;
        let mut reward = 0.0;

        let (enemy_deaths, enemy_hp) = losses(&before.enemies, &after.enemies);
        let (ally_deaths, ally_hp) = losses(&before.allies, &after.allies);
        reward += w.enemy_killed * enemy_deaths as f32 + w.enemy_hp * enemy_hp as f32;
        reward -= w.ally_killed * ally_deaths as f32 + w.ally_hp * ally_hp as f32;

        if let Some(action) = action {
            reward += self.action_terms(action, before, after, enemy_deaths > 0);
        }

        if level_beaten(after) && !level_beaten(before) {
            reward += w.victory;
        }
        if critical_unit_dead(after, &self.protected).is_some()
            && critical_unit_dead(before, &self.protected).is_none()
        {
            reward -= w.defeat;
        }
        reward
    }

    fn action_terms(&self, action: &Action, before: &Snapshot, after: &Snapshot, killed: bool) -> f32 {
        let w = &self.weights;
        let mut reward = match action.kind {
            ActionKind::Move if action.is_noop() => -w.wait,
            ActionKind::Move => after.terrain.class(action.target).reward_bonus(),
            ActionKind::Attack => w.attack,
            ActionKind::UseItem => w.item,
            ActionKind::Rescue => w.rescue,
        };

        let relocates = matches!(action.kind, ActionKind::Move | ActionKind::Attack);
        if relocates && action.target == action.origin && !killed {
            reward -= w.stationary;
        }

        if action.is_noop() {
            if let Some(actor) = before.ally(action.unit) {
                let exposed = actor.health_ratio() < w.exposed_hp_ratio
                    && after
                        .living_enemies()
                        .any(|e| e.pos.distance(actor.pos) <= w.exposed_radius);
                if exposed {
                    reward -= w.exposed_wait;
                }
            }
        }

        if let Some(actor) = after.ally(action.unit) {
            if actor.is_alive() && !actor.has_acted() {
                reward -= w.not_acted;
            }
        }
        reward
    }
}

/// (deaths, HP lost) between two lists, matched by id.
fn losses(before: &[Unit], after: &[Unit]) -> (u32, u32) {
    let mut deaths = 0;
    let mut hp = 0;
    for prev in before {
        let Some(curr) = after.iter().find(|u| u.id == prev.id) else {
            continue;
        };
        if prev.is_alive() && !curr.is_alive() {
            deaths += 1;
        }
        hp += prev.hp.saturating_sub(curr.hp) as u32;
    }
    (deaths, hp)
}
