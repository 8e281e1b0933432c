//! A deterministic stand-in for the game process.
//!
//! [`SimulatedGame`] keeps a scenario [`Snapshot`] as ground truth and
//! models the screens the engine walks through: the free map cursor, a
//! selected unit, the action/weapon/item menus, target selection and the
//! map menu. Movement and range maps are computed from the snapshot.
//!
//! Faults can be injected to exercise recovery: input lag (inputs land only
//! after a number of state reads), swallowed inputs, a jammed input line
//! that drops everything, and a combat preview that never shows a forecast.

mod battle;
mod enemy;

pub use battle::forecast;

use crate::error::LinkError;
use crate::link::{Direction, InputDevice, StateSource};
use crate::menu::{ActionMenu, MAP_MENU, MenuEntry};
use battle::{resolve, unit_mut};
use emblem_core::{
    Allegiance, BattleProjection, Phase, Pos, Snapshot, TurnStatus, UnitId, UnitMaps,
};
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Step(Direction),
    Confirm,
    Cancel,
}

/// A unit that has picked its destination but not yet acted.
#[derive(Debug, Clone, PartialEq)]
struct Moved {
    unit: UnitId,
    origin: Pos,
    entries: Vec<MenuEntry>,
    maps: UnitMaps,
}

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    Map,
    Selected(UnitId),
    ActionMenu(Moved, usize),
    WeaponMenu(Moved, Vec<usize>, usize),
    Targets {
        moved: Moved,
        slot: usize,
        targets: Vec<(UnitId, Pos)>,
        index: usize,
    },
    ItemMenu(Moved, Vec<usize>, usize),
    MapMenu(usize),
}

fn wrap(index: usize, len: usize, direction: Direction) -> usize {
    if len == 0 {
        return 0;
    }
    match direction {
        Direction::Up | Direction::Left => (index + len - 1) % len,
        Direction::Down | Direction::Right => (index + 1) % len,
    }
}

pub struct SimulatedGame {
    initial: Snapshot,
    state: Snapshot,
    screen: Screen,
    pending: VecDeque<(Input, u32)>,
    lag_reads: u32,
    dropped: BTreeSet<u64>,
    jammed: bool,
    forecast_hidden: bool,
    inputs: u64,
    enemy_phase_reads: u32,
    enemy_phase_left: u32,
}

impl SimulatedGame {
    pub fn new(scenario: Snapshot) -> Self {
        Self {
            state: scenario.clone(),
            initial: scenario,
            screen: Screen::Map,
            pending: VecDeque::new(),
            lag_reads: 0,
            dropped: BTreeSet::new(),
            jammed: false,
            forecast_hidden: false,
            inputs: 0,
            enemy_phase_reads: 2,
            enemy_phase_left: 0,
        }
    }

    /// Ground truth, without advancing time.
    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    /// Restart the scenario. Faults stay configured.
    pub fn reset(&mut self) {
        self.state = self.initial.clone();
        self.screen = Screen::Map;
        self.pending.clear();
        self.enemy_phase_left = 0;
    }

    /// Inputs offered so far, delivered or not.
    pub fn inputs_received(&self) -> u64 {
        self.inputs
    }

    /// Inputs land only after `reads` further state reads.
    pub fn set_lag(&mut self, reads: u32) {
        self.lag_reads = reads;
    }

    /// Drop the next `count` inputs.
    pub fn swallow_next(&mut self, count: u32) {
        self.swallow_after(0, count);
    }

    /// Let `skip` inputs through, then drop `count`.
    pub fn swallow_after(&mut self, skip: u64, count: u32) {
        let start = self.inputs + skip;
        self.dropped.extend(start..start + count as u64);
    }

    pub fn set_jammed(&mut self, jammed: bool) {
        self.jammed = jammed;
    }

    /// The combat preview opens but reports no forecast.
    pub fn set_forecast_hidden(&mut self, hidden: bool) {
        self.forecast_hidden = hidden;
    }

    /// State reads the enemy phase lasts before the next ally phase.
    pub fn set_enemy_phase_reads(&mut self, reads: u32) {
        self.enemy_phase_reads = reads;
    }

    fn offer(&mut self, input: Input) -> Result<(), LinkError> {
        let index = self.inputs;
        self.inputs += 1;
        if self.jammed || self.dropped.remove(&index) {
            log::trace!("Dropped input {:?}", input);
            return Ok(());
        }
        if self.lag_reads == 0 && self.pending.is_empty() {
            self.apply(input);
        } else {
            self.pending.push_back((input, self.lag_reads));
        }
        Ok(())
    }

    /// Advance one read: enemy phase progress, then due inputs.
    fn tick(&mut self) {
        if self.state.phase == Phase::Enemy {
            if self.enemy_phase_left > 0 {
                self.enemy_phase_left -= 1;
            } else {
                enemy::run(&mut self.state);
                self.begin_ally_phase();
            }
        }
        while self.pending.front().is_some_and(|(_, wait)| *wait == 0) {
            if let Some((input, _)) = self.pending.pop_front() {
                self.apply(input);
            }
        }
        for (_, wait) in self.pending.iter_mut() {
            *wait = wait.saturating_sub(1);
        }
    }

    fn begin_ally_phase(&mut self) {
        self.state.turn += 1;
        self.state.phase = Phase::Ally;
        let carriers: Vec<Pos> = self
            .state
            .allies
            .iter()
            .filter(|a| a.is_rescued() && a.is_alive())
            .map(|a| a.pos)
            .collect();
        for ally in self.state.allies.iter_mut().filter(|a| !a.is_rescued()) {
            ally.status = if carriers.contains(&ally.pos) {
                TurnStatus::Rescuing
            } else {
                TurnStatus::NotActed
            };
        }
        self.screen = Screen::Map;
        log::debug!("Simulated turn {} begins", self.state.turn);
    }

    fn move_cursor(&mut self, direction: Direction) {
        let next = direction.step_from(self.state.cursor);
        if self.state.terrain.in_bounds(next) {
            self.state.cursor = next;
        }
    }

    /// Move a unit and whoever it carries.
    fn relocate(&mut self, unit: UnitId, to: Pos) {
        let Some(from) = self.state.ally(unit).map(|u| u.pos) else {
            return;
        };
        for ally in self.state.allies.iter_mut() {
            if ally.id == unit || (ally.is_rescued() && ally.pos == from) {
                ally.pos = to;
            }
        }
    }

    fn finish(&mut self, unit: UnitId) {
        if let Some(u) = unit_mut(&mut self.state, Allegiance::Ally, unit) {
            if u.is_alive() {
                u.status = TurnStatus::Acted;
            }
        }
        self.focus(unit);
    }

    /// Put the cursor back on `unit`.
    fn focus(&mut self, unit: UnitId) {
        if let Some(pos) = self.state.ally(unit).map(|u| u.pos) {
            self.state.cursor = pos;
        }
    }

    fn choose_tile(&mut self, unit: UnitId) -> Screen {
        let tile = self.state.cursor;
        let Some(u) = self.state.ally(unit) else {
            return Screen::Map;
        };
        let maps = UnitMaps::compute(&self.state, u);
        if tile != u.pos && (!maps.movement.is_reachable(tile) || self.state.is_blocked_for(tile, u)) {
            return Screen::Selected(unit);
        }
        let moved = Moved {
            unit,
            origin: u.pos,
            entries: ActionMenu::at(&self.state, u, tile).entries().to_vec(),
            maps,
        };
        self.relocate(unit, tile);
        Screen::ActionMenu(moved, 0)
    }

    fn back_to_selection(&mut self, moved: Moved) -> Screen {
        self.relocate(moved.unit, moved.origin);
        self.focus(moved.unit);
        Screen::Selected(moved.unit)
    }

    fn open_entry(&mut self, moved: Moved, index: usize) -> Screen {
        let Some(u) = self.state.ally(moved.unit) else {
            return Screen::Map;
        };
        match moved.entries.get(index) {
            Some(MenuEntry::Attack) => {
                let slots = ActionMenu::weapon_slots(&self.state, u, u.pos);
                Screen::WeaponMenu(moved, slots, 0)
            }
            Some(MenuEntry::Item) => {
                let slots = ActionMenu::item_slots(u);
                Screen::ItemMenu(moved, slots, 0)
            }
            Some(MenuEntry::Rescue) => {
                self.drop_carried(moved.unit);
                self.finish(moved.unit);
                Screen::Map
            }
            Some(MenuEntry::Wait) => {
                self.finish(moved.unit);
                Screen::Map
            }
            None => Screen::ActionMenu(moved, index),
        }
    }

    /// Set the carried ally down on the first free neighbouring tile.
    fn drop_carried(&mut self, unit: UnitId) {
        let Some(carrier) = self.state.ally(unit) else {
            return;
        };
        let Some(carried) = ActionMenu::carried(&self.state, carrier) else {
            return;
        };
        let spot = carrier.pos.neighbors().into_iter().find(|&p| {
            self.state.terrain.in_bounds(p)
                && self.state.terrain.class(p).move_cost().is_some()
                && self.state.occupant(p).is_none()
        });
        match spot {
            Some(spot) => {
                if let Some(u) = unit_mut(&mut self.state, Allegiance::Ally, carried) {
                    u.pos = spot;
                    u.status = TurnStatus::Acted;
                }
            }
            None => log::debug!("No free tile to drop unit {}", carried),
        }
    }

    fn choose_weapon(&mut self, moved: Moved, slots: Vec<usize>, index: usize) -> Screen {
        let Some(slot) = slots.get(index).copied() else {
            return Screen::WeaponMenu(moved, slots, index);
        };
        let Some(u) = self.state.ally(moved.unit) else {
            return Screen::Map;
        };
        let targets = ActionMenu::targets(&self.state, u, u.pos, slot);
        match targets.first() {
            Some(&(_, pos)) => {
                self.state.cursor = pos;
                Screen::Targets {
                    moved,
                    slot,
                    targets,
                    index: 0,
                }
            }
            None => Screen::WeaponMenu(moved, slots, index),
        }
    }

    fn use_item(&mut self, moved: Moved, slots: Vec<usize>, index: usize) -> Screen {
        let Some(&slot) = slots.get(index) else {
            return Screen::ItemMenu(moved, slots, index);
        };
        if let Some(u) = unit_mut(&mut self.state, Allegiance::Ally, moved.unit) {
            if let Some(item) = u.items.get_mut(slot) {
                let heal = item.def().map_or(0, |d| d.heal);
                item.uses = item.uses.saturating_sub(1);
                u.hp = u.hp.saturating_add(heal).min(u.max_hp);
            }
        }
        self.finish(moved.unit);
        Screen::Map
    }

    fn apply(&mut self, input: Input) {
        if self.state.phase != Phase::Ally {
            return;
        }
        let screen = std::mem::replace(&mut self.screen, Screen::Map);
        self.screen = match (screen, input) {
            (Screen::Map, Input::Step(d)) => {
                self.move_cursor(d);
                Screen::Map
            }
            (Screen::Map, Input::Confirm) => match self.state.occupant(self.state.cursor) {
                Some(u) if !u.is_enemy() && u.can_act() => Screen::Selected(u.id),
                Some(u) if u.is_enemy() => Screen::Map,
                _ => Screen::MapMenu(0),
            },
            (Screen::Map, Input::Cancel) => Screen::Map,

            (Screen::Selected(unit), Input::Step(d)) => {
                self.move_cursor(d);
                Screen::Selected(unit)
            }
            (Screen::Selected(unit), Input::Confirm) => self.choose_tile(unit),
            (Screen::Selected(unit), Input::Cancel) => {
                self.focus(unit);
                Screen::Map
            }

            (Screen::ActionMenu(moved, index), Input::Step(d @ (Direction::Up | Direction::Down))) => {
                let len = moved.entries.len();
                Screen::ActionMenu(moved, wrap(index, len, d))
            }
            (Screen::ActionMenu(moved, index), Input::Confirm) => self.open_entry(moved, index),
            (Screen::ActionMenu(moved, _), Input::Cancel) => self.back_to_selection(moved),

            (Screen::WeaponMenu(moved, slots, index), Input::Step(d @ (Direction::Up | Direction::Down))) => {
                let index = wrap(index, slots.len(), d);
                Screen::WeaponMenu(moved, slots, index)
            }
            (Screen::WeaponMenu(moved, slots, index), Input::Confirm) => {
                self.choose_weapon(moved, slots, index)
            }
            (Screen::WeaponMenu(moved, _, _), Input::Cancel) => {
                let index = moved
                    .entries
                    .iter()
                    .position(|e| *e == MenuEntry::Attack)
                    .unwrap_or(0);
                Screen::ActionMenu(moved, index)
            }

            (
                Screen::Targets {
                    moved,
                    slot,
                    targets,
                    index,
                },
                Input::Step(d),
            ) => {
                let index = wrap(index, targets.len(), d);
                if let Some(&(_, pos)) = targets.get(index) {
                    self.state.cursor = pos;
                }
                Screen::Targets {
                    moved,
                    slot,
                    targets,
                    index,
                }
            }
            (
                Screen::Targets {
                    moved,
                    slot,
                    targets,
                    index,
                },
                Input::Confirm,
            ) => {
                if let Some(&(enemy, _)) = targets.get(index) {
                    resolve(
                        &mut self.state,
                        (Allegiance::Ally, moved.unit),
                        slot,
                        (Allegiance::Enemy, enemy),
                    );
                }
                self.finish(moved.unit);
                Screen::Map
            }
            (Screen::Targets { moved, slot, .. }, Input::Cancel) => {
                let Some(u) = self.state.ally(moved.unit) else {
                    return;
                };
                let pos = u.pos;
                let slots = ActionMenu::weapon_slots(&self.state, u, pos);
                self.state.cursor = pos;
                let index = slots.iter().position(|s| *s == slot).unwrap_or(0);
                Screen::WeaponMenu(moved, slots, index)
            }

            (Screen::ItemMenu(moved, slots, index), Input::Step(d @ (Direction::Up | Direction::Down))) => {
                let index = wrap(index, slots.len(), d);
                Screen::ItemMenu(moved, slots, index)
            }
            (Screen::ItemMenu(moved, slots, index), Input::Confirm) => self.use_item(moved, slots, index),
            (Screen::ItemMenu(moved, _, _), Input::Cancel) => {
                let index = moved
                    .entries
                    .iter()
                    .position(|e| *e == MenuEntry::Item)
                    .unwrap_or(0);
                Screen::ActionMenu(moved, index)
            }

            (Screen::MapMenu(index), Input::Step(d @ (Direction::Up | Direction::Down))) => {
                Screen::MapMenu(wrap(index, MAP_MENU.len(), d))
            }
            (Screen::MapMenu(index), Input::Confirm) => {
                if MAP_MENU.get(index) == Some(&"End") {
                    log::debug!("Simulated ally phase ends on turn {}", self.state.turn);
                    self.state.phase = Phase::Enemy;
                    self.enemy_phase_left = self.enemy_phase_reads;
                }
                Screen::Map
            }
            (Screen::MapMenu(_), Input::Cancel) => Screen::Map,

            // Sideways steps inside menus do nothing.
            (screen, Input::Step(_)) => screen,
        };
    }

    fn selected(&self) -> Option<UnitMaps> {
        match &self.screen {
            Screen::Selected(unit) => self
                .state
                .ally(*unit)
                .map(|u| UnitMaps::compute(&self.state, u)),
            Screen::ActionMenu(moved, _)
            | Screen::WeaponMenu(moved, _, _)
            | Screen::ItemMenu(moved, _, _)
            | Screen::Targets { moved, .. } => Some(moved.maps.clone()),
            Screen::Map | Screen::MapMenu(_) => None,
        }
    }
}

impl InputDevice for SimulatedGame {
    fn step(&mut self, direction: Direction) -> Result<(), LinkError> {
        self.offer(Input::Step(direction))
    }

    fn confirm(&mut self) -> Result<(), LinkError> {
        self.offer(Input::Confirm)
    }

    fn cancel(&mut self) -> Result<(), LinkError> {
        self.offer(Input::Cancel)
    }

    fn cursor(&mut self) -> Result<Pos, LinkError> {
        self.tick();
        Ok(self.state.cursor)
    }
}

impl StateSource for SimulatedGame {
    fn snapshot(&mut self) -> Result<Snapshot, LinkError> {
        self.tick();
        Ok(self.state.clone())
    }

    fn unit_maps(&mut self) -> Result<Option<UnitMaps>, LinkError> {
        self.tick();
        Ok(self.selected())
    }

    fn battle_projection(&mut self) -> Result<Option<BattleProjection>, LinkError> {
        self.tick();
        if self.forecast_hidden {
            return Ok(None);
        }
        let Screen::Targets {
            moved,
            slot,
            targets,
            index,
        } = &self.screen
        else {
            return Ok(None);
        };
        let attacker = self.state.ally(moved.unit);
        let defender = targets.get(*index).and_then(|(id, _)| self.state.enemy(*id));
        Ok(attacker
            .zip(defender)
            .and_then(|(a, d)| forecast(&self.state, a, *slot, d)))
    }
}
