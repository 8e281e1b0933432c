//! Translate non-attack actions into menu inputs.
//!
//! Attacks go through [`crate::probe::ProbeCommit`]; everything else is a
//! walk to the destination followed by one menu entry.

use crate::error::ProtocolError;
use crate::link::GameLink;
use crate::menu::{ActionMenu, MenuEntry, menu_path};
use crate::navigate::Navigator;
use emblem_core::{Action, ActionKind, EngineConfig, EngineMetrics};

/// Executes moves, waits, item uses and drops through the game's menus.
pub struct ActionExecutor<'a, L: GameLink + ?Sized> {
    link: &'a mut L,
    config: &'a EngineConfig,
    metrics: &'a mut EngineMetrics,
}

impl<'a, L: GameLink + ?Sized> ActionExecutor<'a, L> {
    pub fn new(link: &'a mut L, config: &'a EngineConfig, metrics: &'a mut EngineMetrics) -> Self {
        Self {
            link,
            config,
            metrics,
        }
    }

    /// Execute one action.
    ///
    /// Returns Ok(true) if the unit now shows as acted, Ok(false) if the
    /// action is not executed here (attacks), or Err if the inputs did not
    /// land after one retry.
    pub fn execute(&mut self, action: &Action) -> Result<bool, ProtocolError> {
        if action.is_attack() {
            log::warn!("Attacks are committed through the probe protocol: {}", action);
            return Ok(false);
        }
        log::info!("Executing: {}", action);
        match self.prepare(action) {
            Err(e) if e.is_retryable() => {
                log::debug!("{} desynced ({}), recovering", action, e);
                Navigator::new(&mut *self.link, self.config).return_to_map()?;
                self.metrics.desyncs_recovered += 1;
                if let Err(e) = self.prepare(action) {
                    self.back_out();
                    return Err(e);
                }
            }
            Err(e) => {
                self.back_out();
                return Err(e);
            }
            Ok(()) => {}
        }

        self.link.confirm()?;
        let reads = self.config.poll.reads_within(self.config.commit_timeout());
        let unit = action.unit;
        Navigator::new(&mut *self.link, self.config).await_snapshot(
            "action to land",
            reads,
            |s| s.ally(unit).is_none_or(|u| u.has_acted() || !u.is_alive()),
        )?;
        Ok(true)
    }

    fn back_out(&mut self) {
        if let Err(e) = Navigator::new(&mut *self.link, self.config).return_to_map() {
            log::error!("Could not return to the map: {}", e);
        }
    }

    /// Everything up to, but not including, the final confirm.
    fn prepare(&mut self, action: &Action) -> Result<(), ProtocolError> {
        let snapshot = self.link.snapshot()?;
        let unit = snapshot
            .ally(action.unit)
            .filter(|u| u.can_act() && u.pos == action.origin)
            .ok_or_else(|| ProtocolError::Desync {
                what: "unit",
                expected: format!("unit {} ready at {}", action.unit, action.origin),
                observed: "unit moved, missing or spent".to_string(),
            })?;

        let mut nav = Navigator::new(&mut *self.link, self.config);
        nav.move_cursor_to(action.origin)?;
        nav.link().confirm()?;
        let maps = nav.await_unit_maps()?;
        if !maps.movement.is_reachable(action.target) {
            return Err(ProtocolError::Unreachable(action.target));
        }
        nav.move_cursor_to(action.target)?;
        nav.link().confirm()?;

        let menu = ActionMenu::at(&snapshot, unit, action.target);
        let entry = match action.kind {
            ActionKind::Move => MenuEntry::Wait,
            ActionKind::UseItem => MenuEntry::Item,
            ActionKind::Rescue => MenuEntry::Rescue,
            ActionKind::Attack => return Err(ProtocolError::Unreachable(action.target)),
        };
        let path = menu
            .path_to(entry)
            .ok_or(ProtocolError::Unreachable(action.target))?;
        nav.press(&path)?;

        if action.kind == ActionKind::UseItem {
            nav.link().confirm()?;
            let slots = ActionMenu::item_slots(unit);
            let index = action
                .slot
                .and_then(|slot| slots.iter().position(|s| *s == slot))
                .ok_or(ProtocolError::Unreachable(action.target))?;
            nav.press(&menu_path(index, slots.len()))?;
        }
        Ok(())
    }

    /// Execute a batch of actions.
    ///
    /// Returns the count of successfully executed actions.
    pub fn execute_all(&mut self, actions: &[Action]) -> usize {
        let mut executed = 0;
        for action in actions {
            match self.execute(action) {
                Ok(true) => executed += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to execute {}: {}", action, e),
            }
        }
        executed
    }
}
