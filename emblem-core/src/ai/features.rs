use crate::action::{Action, ActionKind};
use crate::state::{Pos, Snapshot, Unit, UnitId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of [`ActionFeatures::to_vector`].
pub const FEATURE_DIM: usize = 16;

const THREAT_RADIUS: u32 = 2;
const HIDDEN_THREAT_RADIUS: u32 = 5;

/// Fixed-shape feature record for one candidate action.
///
/// Built by [`ActionFeatures::extract`], which guarantees every field is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionFeatures {
    pub action_code: f32,
    pub unit_health: f32,
    /// Unit to target cell.
    pub distance: f32,
    pub terrain_cost: f32,
    pub threat: f32,
    pub damage: f32,
    pub position_value: f32,
    pub visible_enemies: f32,
    pub hidden_enemies: f32,
    pub nearest_visible_enemy: f32,
    pub nearest_enemy: f32,
    pub hidden_threat: f32,
    pub target_health: f32,
    pub target_is_enemy: f32,
    pub item_id: f32,
    /// Target cell to the closest visible enemy.
    pub approach: f32,
}

#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("acting unit {0} is not an ally in the snapshot")]
    UnknownUnit(UnitId),
    #[error("feature {0} is not finite")]
    NonFinite(&'static str),
}

impl ActionFeatures {
    pub fn extract(snapshot: &Snapshot, action: &Action) -> Result<Self, FeatureError> {
        let unit = snapshot
            .ally(action.unit)
            .ok_or(FeatureError::UnknownUnit(action.unit))?;
        let target = action.target;
        let terrain = snapshot.terrain.class(target);
        // Stand-in distance when there is nothing to measure against.
        let far = snapshot.terrain.width as f32 + snapshot.terrain.height as f32;

        let visible: Vec<&Unit> = snapshot.visible_enemies().collect();
        let hidden: Vec<&Unit> = snapshot
            .living_enemies()
            .filter(|e| !e.is_visible())
            .collect();

        let threat = visible
            .iter()
            .map(|e| (e, e.pos.distance(target)))
            .filter(|(_, d)| *d <= THREAT_RADIUS)
            .map(|(e, d)| e.health_ratio() / (d as f32 + 1.0))
            .sum::<f32>();
        let hidden_threat = hidden
            .iter()
            .map(|e| e.pos.distance(target))
            .filter(|d| *d <= HIDDEN_THREAT_RADIUS)
            .map(|d| 1.0 / (d as f32 + 1.0))
            .sum::<f32>();

        let target_unit = action.target_unit.and_then(|id| match action.kind {
            ActionKind::Attack => snapshot.enemy(id),
            _ => snapshot.ally(id),
        });

        let features = Self {
            action_code: action.kind.code() as f32,
            unit_health: unit.health_ratio(),
            distance: unit.pos.distance(target) as f32,
            terrain_cost: terrain.feature_cost(),
            threat,
            damage: target_unit
                .filter(|t| t.is_enemy())
                .map(|t| raw_damage(unit, t, action))
                .unwrap_or(0.0),
            position_value: terrain.position_value(),
            visible_enemies: visible.len() as f32,
            hidden_enemies: hidden.len() as f32,
            nearest_visible_enemy: nearest(unit.pos, visible.iter().copied()).unwrap_or(far),
            nearest_enemy: nearest(unit.pos, snapshot.living_enemies()).unwrap_or(far),
            hidden_threat,
            target_health: target_unit.map(Unit::health_ratio).unwrap_or(0.0),
            target_is_enemy: if target_unit.is_some_and(Unit::is_enemy) { 1.0 } else { 0.0 },
            item_id: action.item.map(|i| i as f32).unwrap_or(0.0),
            approach: nearest(target, visible.iter().copied()).unwrap_or(far),
        };
        features.check_finite()?;
        Ok(features)
    }

    fn check_finite(&self) -> Result<(), FeatureError> {
        let named = [
            ("unit_health", self.unit_health),
            ("threat", self.threat),
            ("damage", self.damage),
            ("hidden_threat", self.hidden_threat),
            ("target_health", self.target_health),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(FeatureError::NonFinite(name));
            }
        }
        Ok(())
    }

    /// Normalized vector fed to learned estimators.
    pub fn to_vector(&self) -> [f32; FEATURE_DIM] {
        [
            self.action_code / 3.0,
            self.unit_health,
            self.distance / 10.0,
            self.terrain_cost / 3.0,
            self.threat,
            self.damage / 20.0,
            self.position_value,
            self.target_health,
            self.target_is_enemy,
            self.item_id / 255.0,
            self.visible_enemies / 10.0,
            self.hidden_enemies / 10.0,
            self.nearest_visible_enemy / 10.0,
            self.nearest_enemy / 10.0,
            self.hidden_threat,
            self.approach / 10.0,
        ]
    }
}

fn nearest<'a>(from: Pos, units: impl Iterator<Item = &'a Unit>) -> Option<f32> {
    units.map(|u| from.distance(u.pos)).min().map(|d| d as f32)
}

/// Offensive stat plus weapon might against defense, or resistance for magic.
fn raw_damage(unit: &Unit, target: &Unit, action: &Action) -> f32 {
    let weapon = action
        .item
        .and_then(crate::items::lookup)
        .filter(|d| d.is_weapon());
    let might = weapon.map(|w| w.might as i32).unwrap_or(0);
    let guard = match weapon {
        Some(w) if w.is_magic() => target.stats.resistance,
        _ => target.stats.defense,
    };
    (unit.stats.strength as i32 + might - guard as i32).max(0) as f32
}
