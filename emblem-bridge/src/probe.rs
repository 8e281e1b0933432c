//! Probe-then-commit for attacks.
//!
//! Each candidate (launch tile, enemy, weapon) is driven through the game's
//! menus up to the combat preview, the forecast is read, and the menus are
//! backed out again so the unit stays un-acted. Only the winner is replayed
//! and confirmed.
//!
//! ```text
//! Idle ─▶ CursorOnUnit ─▶ UnitSelected ─▶ CursorOnTarget ─▶ CombatPreview ─┬─▶ Committed
//!                                                                          └─▶ Aborted
//! ```
//!
//! A desync or timeout on the way to the preview is recovered (cancel back
//! to the map) and retried once. The final confirm of a commit is never
//! retried.

use crate::error::ProtocolError;
use crate::link::GameLink;
use crate::menu::{ActionMenu, MenuEntry, menu_path};
use crate::navigate::Navigator;
use emblem_core::{
    Action, BattleProjection, EngineConfig, EngineMetrics, ItemId, Pos, Snapshot, UnitId,
};
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    CursorOnUnit,
    UnitSelected,
    CursorOnTarget,
    CombatPreview,
    Committed,
    Aborted,
}

/// One attack candidate, resolved against the snapshot it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackPlan {
    pub unit: UnitId,
    pub origin: Pos,
    pub tile: Pos,
    pub enemy: UnitId,
    pub enemy_pos: Pos,
    pub slot: usize,
    pub item: ItemId,
}

impl AttackPlan {
    pub fn from_action(snapshot: &Snapshot, action: &Action) -> Option<Self> {
        if !action.is_attack() {
            return None;
        }
        let enemy = snapshot.enemy(action.target_unit?)?;
        Some(Self {
            unit: action.unit,
            origin: action.origin,
            tile: action.target,
            enemy: enemy.id,
            enemy_pos: enemy.pos,
            slot: action.slot?,
            item: action.item?,
        })
    }
}

impl fmt::Display for AttackPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unit {} -> enemy {} from {} with item 0x{:02X}",
            self.unit, self.enemy, self.tile, self.item
        )
    }
}

pub struct ProbeCommit<'a, L: GameLink + ?Sized> {
    link: &'a mut L,
    config: &'a EngineConfig,
    metrics: &'a mut EngineMetrics,
    state: ProbeState,
}

impl<'a, L: GameLink + ?Sized> ProbeCommit<'a, L> {
    pub fn new(link: &'a mut L, config: &'a EngineConfig, metrics: &'a mut EngineMetrics) -> Self {
        Self {
            link,
            config,
            metrics,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    fn enter(&mut self, state: ProbeState) {
        log::trace!("Probe state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Drive from the neutral map to the combat preview of `plan`.
    fn to_preview(&mut self, plan: &AttackPlan) -> Result<BattleProjection, ProtocolError> {
        self.enter(ProbeState::Idle);
        let snapshot = self.link.snapshot()?;
        let unit = snapshot
            .ally(plan.unit)
            .filter(|u| u.can_act())
            .ok_or_else(|| ProtocolError::Desync {
                what: "unit",
                expected: format!("unit {} ready to act", plan.unit),
                observed: "unit missing or spent".to_string(),
            })?;
        if unit.pos != plan.origin {
            return Err(ProtocolError::Desync {
                what: "unit position",
                expected: plan.origin.to_string(),
                observed: unit.pos.to_string(),
            });
        }

        let mut nav = Navigator::new(&mut *self.link, self.config);
        nav.move_cursor_to(plan.origin)?;
        self.state = ProbeState::CursorOnUnit;

        nav.link().confirm()?;
        nav.await_unit_maps()?;
        self.state = ProbeState::UnitSelected;

        nav.move_cursor_to(plan.tile)?;
        nav.link().confirm()?;
        let menu = ActionMenu::at(&snapshot, unit, plan.tile);
        let path = menu
            .path_to(MenuEntry::Attack)
            .ok_or(ProtocolError::Unreachable(plan.tile))?;
        nav.press(&path)?;
        nav.link().confirm()?;

        let weapons = ActionMenu::weapon_slots(&snapshot, unit, plan.tile);
        let index = weapons
            .iter()
            .position(|slot| *slot == plan.slot)
            .ok_or(ProtocolError::PredictionUnavailable {
                unit: plan.unit,
                enemy: plan.enemy,
            })?;
        nav.press(&menu_path(index, weapons.len()))?;
        nav.link().confirm()?;

        let targets = ActionMenu::targets(&snapshot, unit, plan.tile, plan.slot);
        nav.cycle_to(plan.enemy_pos, targets.len())?;
        self.state = ProbeState::CursorOnTarget;

        let reads = self.config.poll.max_reads();
        let projection = nav.poll("battle projection", reads, |link| {
            Ok(link
                .battle_projection()?
                .filter(|p| p.attacker == plan.unit && p.defender == plan.enemy))
        })?;
        if projection.item != plan.item || projection.tile != plan.tile {
            return Err(ProtocolError::Desync {
                what: "combat preview",
                expected: format!("item 0x{:02X} from {}", plan.item, plan.tile),
                observed: format!("item 0x{:02X} from {}", projection.item, projection.tile),
            });
        }
        self.enter(ProbeState::CombatPreview);
        Ok(projection)
    }

    fn to_preview_with_retry(&mut self, plan: &AttackPlan) -> Result<BattleProjection, ProtocolError> {
        match self.to_preview(plan) {
            Err(e) if e.is_retryable() => {
                log::debug!("Probe of {} desynced ({}), recovering", plan, e);
                Navigator::new(&mut *self.link, self.config).return_to_map()?;
                self.metrics.desyncs_recovered += 1;
                self.to_preview(plan)
            }
            other => other,
        }
    }

    /// Back out to the map and check the unit is untouched.
    fn abort(&mut self, plan: &AttackPlan) -> Result<(), ProtocolError> {
        let mut nav = Navigator::new(&mut *self.link, self.config);
        nav.return_to_map()?;
        let reads = self.config.poll.max_reads();
        nav.await_snapshot("unit back on its origin", reads, |s| {
            s.ally(plan.unit)
                .is_some_and(|u| u.pos == plan.origin && u.can_act())
        })?;
        self.enter(ProbeState::Aborted);
        Ok(())
    }

    /// Read the forecast for `plan` without committing.
    pub fn probe(&mut self, plan: &AttackPlan) -> Result<BattleProjection, ProtocolError> {
        let started = Instant::now();
        self.metrics.probes_issued += 1;
        let previewed = self.to_preview_with_retry(plan);
        let aborted = self.abort(plan);
        self.metrics.probe_time += started.elapsed();
        match (previewed, aborted) {
            (Ok(projection), Ok(())) => {
                log::debug!(
                    "Probed {}: score {}, defender hp after {}",
                    plan,
                    projection.combat_score(),
                    projection.defender_hp_after
                );
                Ok(projection)
            }
            (Err(e), _) | (Ok(_), Err(e)) => {
                self.metrics.probes_failed += 1;
                log::warn!("Probe of {} unusable: {}", plan, e);
                Err(e)
            }
        }
    }

    /// Replay `plan` to the preview and confirm it. Returns the forecast that
    /// was on screen when the attack was confirmed.
    pub fn commit(&mut self, plan: &AttackPlan) -> Result<BattleProjection, ProtocolError> {
        let projection = match self.to_preview_with_retry(plan) {
            Ok(projection) => projection,
            Err(e) => {
                if let Err(abort) = self.abort(plan) {
                    log::error!("Could not back out of failed commit for {}: {}", plan, abort);
                }
                return Err(e);
            }
        };

        self.link.confirm()?;
        self.enter(ProbeState::Committed);
        self.metrics.commits += 1;

        let reads = self.config.poll.reads_within(self.config.commit_timeout());
        Navigator::new(&mut *self.link, self.config).await_snapshot("commit to land", reads, |s| {
            s.ally(plan.unit)
                .is_none_or(|u| u.has_acted() || !u.is_alive())
        })?;
        log::info!("Committed {}", plan);
        Ok(projection)
    }

    /// Probe every candidate attack in `attacks` and return the best one.
    ///
    /// Candidates on defensive terrain go first; once `max_good_tile_probes`
    /// defensive tiles have produced a forecast, plain tiles are skipped.
    /// Ties keep the earlier candidate.
    pub fn best_attack(
        &mut self,
        snapshot: &Snapshot,
        attacks: &[Action],
    ) -> Option<(AttackPlan, BattleProjection)> {
        let is_good = |tile: Pos| snapshot.terrain.class(tile).is_defensive();
        let mut candidates: Vec<AttackPlan> = attacks
            .iter()
            .filter_map(|a| AttackPlan::from_action(snapshot, a))
            .collect();
        candidates.sort_by_key(|plan| !is_good(plan.tile));

        let limit = self.config.max_good_tile_probes;
        let mut good_tiles: HashSet<Pos> = HashSet::new();
        let mut best: Option<(AttackPlan, BattleProjection, i32)> = None;
        for plan in candidates {
            let good = is_good(plan.tile);
            if !good && limit > 0 && good_tiles.len() >= limit {
                log::trace!("Skipping plain-tile probe {}", plan);
                continue;
            }
            let Ok(projection) = self.probe(&plan) else {
                continue;
            };
            if good {
                good_tiles.insert(plan.tile);
            }
            let score = projection.combat_score();
            if best.as_ref().is_none_or(|(_, _, top)| score > *top) {
                best = Some((plan, projection, score));
            }
        }
        best.map(|(plan, projection, _)| (plan, projection))
    }
}
