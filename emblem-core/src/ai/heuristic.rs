use super::features::ActionFeatures;
use crate::action::ActionKind;

/// Deterministic scorer used when no learned estimator is available.
///
/// Attacks are favoured, weighted toward damage and finishing wounded targets.
/// Moves close the distance to the nearest visible enemy while avoiding
/// threatened tiles when the unit is hurt.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, f: &ActionFeatures) -> f32 {
        let wounded = 1.0 - f.unit_health;
        match f.action_code as u8 {
            c if c == ActionKind::Attack.code() => {
                50.0 + 3.0 * f.damage + 40.0 * (1.0 - f.target_health) + 5.0 * f.position_value
                    - 10.0 * f.threat * wounded
            }
            c if c == ActionKind::UseItem.code() => {
                if f.unit_health < 0.5 {
                    30.0 * wounded
                } else {
                    -5.0
                }
            }
            c if c == ActionKind::Rescue.code() => 1.0,
            _ => {
                let wait = if f.distance == 0.0 { 2.0 } else { 0.0 };
                -f.approach + 3.0 * f.position_value - 8.0 * f.threat * wounded - wait
            }
        }
    }
}
