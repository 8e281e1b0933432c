//! Main turn loop.
//!
//! Coordinates: probe all units → select and act → end turn → await the
//! next ally phase, until a terminal condition, cancellation or the turn
//! limit.

use crate::actions::ActionExecutor;
use crate::error::ProtocolError;
use crate::link::GameLink;
use crate::menu::map_menu_end_path;
use crate::navigate::Navigator;
use crate::probe::{AttackPlan, ProbeCommit, ProbeState};
use emblem_core::{
    Action, ActionEnumerator, ActionKind, ActionScorer, Allegiance, BattleProjection,
    DecisionRecord, EngineConfig, EngineMetrics, EpsilonGreedy, Phase, Pos, RewardEstimator,
    SinkRegistry, Snapshot, TerminationCause, TrainingSink, Unit, UnitId, UnitMaps,
    check_terminal, critical_unit_dead,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Cooperative cancellation, checked between unit actions and between
/// turns. An in-flight probe or commit always finishes first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How an episode ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub episode: u32,
    pub cause: TerminationCause,
    pub turns: u32,
    pub decisions: u64,
    pub total_reward: f64,
    pub metrics: EngineMetrics,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "episode {}: {} after {} turns, {} decisions, reward {:.1}, probes {} ({:.0}% usable)",
            self.episode,
            self.cause,
            self.turns,
            self.decisions,
            self.total_reward,
            self.metrics.probes_issued,
            self.metrics.probe_success_rate() * 100.0
        )
    }
}

/// One unit's candidate actions for the turn.
#[derive(Debug, Clone)]
pub struct UnitPlan {
    pub unit: UnitId,
    pub actions: Vec<Action>,
}

impl UnitPlan {
    fn attacks_living(&self, living: &dyn Fn(UnitId) -> bool) -> bool {
        self.actions
            .iter()
            .any(|a| a.is_attack() && a.target_unit.is_some_and(living))
    }
}

/// Drop actions the selected unit's maps rule out: moves into unreachable
/// or occupied tiles, and attacks on enemies outside the range map.
pub fn filter_actions(snapshot: &Snapshot, unit: &Unit, maps: &UnitMaps, actions: Vec<Action>) -> Vec<Action> {
    if !unit.can_act() {
        return Vec::new();
    }
    actions
        .into_iter()
        .filter(|a| match a.kind {
            ActionKind::Move => {
                maps.movement.is_reachable(a.target) && !snapshot.is_blocked_for(a.target, unit)
            }
            ActionKind::Attack => a
                .target_unit
                .and_then(|id| snapshot.enemy(id))
                .is_some_and(|e| maps.range.in_range(e.pos)),
            ActionKind::Rescue | ActionKind::UseItem => true,
        })
        .collect()
}

/// Changes over the course of one ally phase.
#[derive(Debug, Default)]
struct TurnLedger {
    acted: HashSet<UnitId>,
    dead_enemies: HashSet<UnitId>,
}

enum TurnEnd {
    Next(Snapshot),
    Terminated(TerminationCause),
}

/// Positions and HP of every unit, for stall detection.
fn board(snapshot: &Snapshot) -> Vec<(Allegiance, UnitId, Pos, u8)> {
    snapshot
        .allies
        .iter()
        .chain(snapshot.enemies.iter())
        .map(|u| (u.allegiance, u.id, u.pos, u.hp))
        .collect()
}

pub struct TurnOrchestrator<L: GameLink> {
    link: L,
    config: EngineConfig,
    scorer: ActionScorer,
    reward: RewardEstimator,
    policy: EpsilonGreedy,
    sinks: SinkRegistry,
    metrics: EngineMetrics,
    totals: EngineMetrics,
    cancel: CancelToken,
    episode: u32,
}

impl<L: GameLink> TurnOrchestrator<L> {
    pub fn new(link: L, config: EngineConfig, scorer: ActionScorer) -> Self {
        log::info!(
            "Initializing orchestrator with {} scorer, exploration from {:.2}",
            scorer.name(),
            config.exploration.start
        );
        Self {
            reward: RewardEstimator::new(config.reward.clone(), config.protected_units.clone()),
            policy: EpsilonGreedy::new(config.exploration.clone()),
            link,
            config,
            scorer,
            sinks: SinkRegistry::new(),
            metrics: EngineMetrics::default(),
            totals: EngineMetrics::default(),
            cancel: CancelToken::new(),
            episode: 0,
        }
    }

    pub fn register_sink(&mut self, sink: Box<dyn TrainingSink>) {
        self.sinks.register(sink);
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Counters summed over every finished episode.
    pub fn totals(&self) -> &EngineMetrics {
        &self.totals
    }

    /// Flush the training sinks and hand back the link.
    pub fn into_link(self) -> L {
        self.sinks.shutdown();
        self.link
    }

    fn read_snapshot(&mut self) -> Result<Snapshot, ProtocolError> {
        Ok(self.link.snapshot()?)
    }

    /// Run `step`; on a desync or timeout, recover to the map and run it
    /// once more.
    fn with_retry<T>(
        &mut self,
        what: &str,
        mut step: impl FnMut(&mut Navigator<'_, L>) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let mut nav = Navigator::new(&mut self.link, &self.config);
        match step(&mut nav) {
            Err(e) if e.is_retryable() => {
                log::warn!("{} failed ({}), recovering and retrying", what, e);
                nav.return_to_map()?;
                self.metrics.desyncs_recovered += 1;
                let retried = step(&mut nav);
                if retried.is_err() {
                    if let Err(e) = nav.return_to_map() {
                        log::error!("Could not return to the map after {}: {}", what, e);
                    }
                }
                retried
            }
            other => other,
        }
    }

    /// Play one episode to its end.
    pub fn run_episode(&mut self) -> RunReport {
        let started = Instant::now();
        let episode = self.episode;
        self.policy.begin_episode(episode);
        log::info!(
            "Episode {} starts (exploration {:.2})",
            episode,
            self.policy.rate()
        );

        let mut turns = 0;
        let mut last_board = None;
        let mut unchanged = 0;
        let cause = loop {
            if self.cancel.is_cancelled() {
                break TerminationCause::Cancelled;
            }
            if self.config.max_turns > 0 && turns >= self.config.max_turns {
                break TerminationCause::TurnLimit;
            }
            match self.play_turn() {
                Ok(TurnEnd::Terminated(cause)) => break cause,
                Ok(TurnEnd::Next(snapshot)) => {
                    turns += 1;
                    self.metrics.turns += 1;
                    let current = board(&snapshot);
                    if last_board.as_ref() == Some(&current) {
                        unchanged += 1;
                    } else {
                        unchanged = 0;
                    }
                    last_board = Some(current);
                    if self.config.stall_turns > 0 && unchanged >= self.config.stall_turns {
                        break TerminationCause::Stalled;
                    }
                }
                Err(e) => {
                    log::error!("Turn {} could not be completed: {}", turns + 1, e);
                    break TerminationCause::DesyncExhausted;
                }
            }
        };

        self.metrics.wall_time = started.elapsed();
        let metrics = std::mem::take(&mut self.metrics);
        self.totals.merge(&metrics);
        self.episode += 1;

        let report = RunReport {
            episode,
            cause,
            turns,
            decisions: metrics.decisions,
            total_reward: metrics.total_reward,
            metrics,
        };
        log::info!("{}", report);
        report
    }

    fn play_turn(&mut self) -> Result<TurnEnd, ProtocolError> {
        let mut snapshot = self.read_snapshot()?;
        if snapshot.phase != Phase::Ally {
            snapshot = self.await_ally_phase(None)?;
        }
        if let Some(cause) = check_terminal(&snapshot, &self.config.protected_units) {
            return Ok(TurnEnd::Terminated(cause));
        }

        let plans = self.probe_all_units(&snapshot);
        if plans.iter().any(|p| p.actions.iter().any(Action::is_attack)) {
            if let Some(cause) = self.select_and_act(plans)? {
                return Ok(TurnEnd::Terminated(cause));
            }
        } else {
            log::info!("Turn {}: no unit can attack, ending turn", snapshot.turn);
        }

        if self.cancel.is_cancelled() {
            return Ok(TurnEnd::Terminated(TerminationCause::Cancelled));
        }
        self.end_turn(snapshot.turn)?;
        let next = self.await_ally_phase(Some(snapshot.turn))?;
        Ok(TurnEnd::Next(next))
    }

    /// Select each ready unit once to read its maps, then enumerate and
    /// filter its actions.
    fn probe_all_units(&mut self, snapshot: &Snapshot) -> Vec<UnitPlan> {
        let ready: Vec<&Unit> = snapshot.ready_units().collect();
        let enumerator = ActionEnumerator::new(snapshot);
        let mut plans = Vec::with_capacity(ready.len());
        for unit in ready {
            let origin = unit.pos;
            let maps = self.with_retry("reading unit maps", |nav| {
                nav.return_to_map()?;
                nav.move_cursor_to(origin)?;
                nav.link().confirm()?;
                let maps = nav.await_unit_maps()?;
                nav.return_to_map()?;
                Ok(maps)
            });
            match maps {
                Ok(maps) => {
                    let actions =
                        filter_actions(snapshot, unit, &maps, enumerator.enumerate(unit, Some(&maps)));
                    log::debug!(
                        "Unit {} has {} actions, {} attacks",
                        unit.id,
                        actions.len(),
                        actions.iter().filter(|a| a.is_attack()).count()
                    );
                    plans.push(UnitPlan {
                        unit: unit.id,
                        actions,
                    });
                }
                Err(e) => log::warn!("Skipping unit {} this turn: {}", unit.id, e),
            }
        }
        plans
    }

    /// Act with every planned unit, attack holders first.
    fn select_and_act(&mut self, mut pool: Vec<UnitPlan>) -> Result<Option<TerminationCause>, ProtocolError> {
        let mut ledger = TurnLedger::default();
        while !pool.is_empty() {
            if self.cancel.is_cancelled() {
                return Ok(Some(TerminationCause::Cancelled));
            }
            let before = self.read_snapshot()?;
            if let Some(cause) = check_terminal(&before, &self.config.protected_units) {
                return Ok(Some(cause));
            }
            ledger
                .dead_enemies
                .extend(before.enemies.iter().filter(|e| !e.is_alive()).map(|e| e.id));

            let dead = &ledger.dead_enemies;
            let living = |id: UnitId| !dead.contains(&id) && before.enemy(id).is_some_and(|e| e.is_alive());
            let next = pool
                .iter()
                .position(|p| p.attacks_living(&living))
                .unwrap_or(0);
            let plan = pool.remove(next);

            if ledger.acted.contains(&plan.unit) || !before.ally(plan.unit).is_some_and(|u| u.can_act()) {
                log::debug!("Unit {} can no longer act this turn", plan.unit);
                continue;
            }
            let Some((action, projection)) = self.act(&before, plan, &ledger.dead_enemies) else {
                continue;
            };

            let after = self.read_snapshot()?;
            let reward = self.reward.estimate(&before, Some(&action), &after);
            log::info!("Turn {}: {} (reward {:.1})", before.turn, action, reward);
            ledger.acted.insert(action.unit);
            if let Some(p) = projection.filter(|p| p.predicts_kill()) {
                ledger.dead_enemies.insert(p.defender);
            }
            ledger
                .dead_enemies
                .extend(after.enemies.iter().filter(|e| !e.is_alive()).map(|e| e.id));

            self.metrics.decisions += 1;
            self.metrics.total_reward += reward as f64;
            let record = DecisionRecord {
                episode: self.episode,
                turn: before.turn,
                before,
                action,
                reward,
                after,
            };
            self.sinks.notify(&record);

            if let Some(unit) = critical_unit_dead(&record.after, &self.config.protected_units) {
                return Ok(Some(TerminationCause::CriticalDeath(unit)));
            }
            if let Some(cause) = check_terminal(&record.after, &self.config.protected_units) {
                return Ok(Some(cause));
            }
        }
        Ok(None)
    }

    /// Resolve one unit's decision: the best forecast attack if any probe
    /// succeeds, otherwise the scorer's pick among the rest.
    fn act(
        &mut self,
        before: &Snapshot,
        plan: UnitPlan,
        dead: &HashSet<UnitId>,
    ) -> Option<(Action, Option<BattleProjection>)> {
        let unit = before.ally(plan.unit)?;
        let (attacks, others): (Vec<Action>, Vec<Action>) = plan
            .actions
            .into_iter()
            .filter(|a| a.target == unit.pos || !before.is_blocked_for(a.target, unit))
            .partition(Action::is_attack);
        let attacks: Vec<Action> = attacks
            .into_iter()
            .filter(|a| {
                a.target_unit
                    .is_some_and(|id| !dead.contains(&id) && before.enemy(id).is_some_and(|e| e.is_alive()))
            })
            .collect();

        if !attacks.is_empty() {
            let mut probe = ProbeCommit::new(&mut self.link, &self.config, &mut self.metrics);
            match probe.best_attack(before, &attacks) {
                Some((chosen, _)) => {
                    let action = attacks
                        .iter()
                        .find(|a| AttackPlan::from_action(before, a) == Some(chosen))
                        .cloned()?;
                    match probe.commit(&chosen) {
                        Ok(projection) => return Some((action, Some(projection))),
                        Err(e) if probe.state() == ProbeState::Committed => {
                            log::error!("Commit of {} did not confirm: {}", chosen, e);
                            return Some((action, None));
                        }
                        Err(e) => log::warn!("Commit of {} failed before confirming: {}", chosen, e),
                    }
                }
                None => log::info!("No usable forecast for unit {}, weighing other actions", unit.id),
            }
        }

        let ranked = self.scorer.rank(before, others);
        let choice = self.policy.pick(&ranked)?.clone();
        let mut executor = ActionExecutor::new(&mut self.link, &self.config, &mut self.metrics);
        match executor.execute(&choice) {
            Ok(true) => Some((choice, None)),
            Ok(false) => None,
            Err(e) => {
                log::error!("Failed to execute {}: {}", choice, e);
                None
            }
        }
    }

    /// Required waits, then End from the map menu.
    fn end_turn(&mut self, turn: u32) -> Result<(), ProtocolError> {
        let snapshot = self.read_snapshot()?;
        let waits: Vec<Action> = self
            .config
            .must_act
            .iter()
            .filter_map(|id| snapshot.ally(*id))
            .filter(|u| u.can_act())
            .map(Action::wait)
            .collect();
        if !waits.is_empty() {
            let mut executor = ActionExecutor::new(&mut self.link, &self.config, &mut self.metrics);
            let done = executor.execute_all(&waits);
            log::info!("{} of {} required units waited", done, waits.len());
        }

        let reads = self.config.poll.reads_within(self.config.phase_timeout());
        self.with_retry("ending the turn", |nav| {
            let current = nav.link().snapshot()?;
            if current.phase != Phase::Ally || current.turn > turn {
                return Ok(());
            }
            nav.return_to_map()?;
            let spot = current
                .allies
                .iter()
                .find(|a| a.is_alive() && a.has_acted())
                .map(|a| a.pos)
                .or_else(|| current.terrain.positions().find(|p| current.occupant(*p).is_none()))
                .ok_or(ProtocolError::Unreachable(current.cursor))?;
            nav.move_cursor_to(spot)?;
            nav.link().confirm()?;
            nav.press(&map_menu_end_path())?;
            nav.link().confirm()?;
            nav.await_snapshot("ally phase to end", reads, |s| {
                s.phase != Phase::Ally || s.turn > turn
            })?;
            Ok(())
        })?;
        log::debug!("Turn {} ended", turn);
        Ok(())
    }

    /// Wait for an ally phase, after `turn` if given. One retry.
    fn await_ally_phase(&mut self, turn: Option<u32>) -> Result<Snapshot, ProtocolError> {
        let reads = self.config.poll.reads_within(self.config.phase_timeout());
        let ready = |s: &Snapshot| s.phase == Phase::Ally && turn.is_none_or(|t| s.turn > t);
        let mut nav = Navigator::new(&mut self.link, &self.config);
        match nav.await_snapshot("next ally phase", reads, ready) {
            Err(e) if e.is_retryable() => {
                log::warn!("Enemy phase is taking long ({}), waiting once more", e);
                nav.await_snapshot("next ally phase", reads, ready)
            }
            other => other,
        }
    }
}
