//! Cursor navigation and bounded polling on top of the four input
//! primitives.
//!
//! Every wait reads external state a bounded number of times with a fixed
//! pause in between. Cursor positions and the selection state only count
//! once the same value has been read `settle_reads` times in a row, so a
//! lagging process is not mistaken for a finished move.

use crate::error::{LinkError, ProtocolError};
use crate::link::{Direction, GameLink};
use emblem_core::{EngineConfig, Pos, Snapshot, UnitMaps};
use std::thread;

pub struct Navigator<'a, L: GameLink + ?Sized> {
    link: &'a mut L,
    config: &'a EngineConfig,
}

impl<'a, L: GameLink + ?Sized> Navigator<'a, L> {
    pub fn new(link: &'a mut L, config: &'a EngineConfig) -> Self {
        Self { link, config }
    }

    pub fn link(&mut self) -> &mut L {
        &mut *self.link
    }

    fn pause(&self) {
        let interval = self.config.poll.interval();
        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    /// Read until `probe` yields a value, at most `reads` times.
    pub fn poll<T>(
        &mut self,
        what: &'static str,
        reads: u32,
        mut probe: impl FnMut(&mut L) -> Result<Option<T>, LinkError>,
    ) -> Result<T, ProtocolError> {
        for _ in 0..reads.max(1) {
            if let Some(value) = probe(&mut *self.link)? {
                return Ok(value);
            }
            self.pause();
        }
        log::debug!("Gave up waiting for {} after {} reads", what, reads);
        Err(ProtocolError::Timeout(what))
    }

    /// Poll snapshots until `pred` holds.
    pub fn await_snapshot(
        &mut self,
        what: &'static str,
        reads: u32,
        pred: impl Fn(&Snapshot) -> bool,
    ) -> Result<Snapshot, ProtocolError> {
        self.poll(what, reads, |link| {
            let snapshot = link.snapshot()?;
            Ok(pred(&snapshot).then_some(snapshot))
        })
    }

    pub fn await_unit_maps(&mut self) -> Result<UnitMaps, ProtocolError> {
        let reads = self.config.poll.max_reads();
        self.poll("unit maps", reads, |link| link.unit_maps())
    }

    /// Read until `read` returns the same value `settle_reads` times in a
    /// row.
    fn settled<T: PartialEq>(
        &mut self,
        what: &'static str,
        mut read: impl FnMut(&mut L) -> Result<T, LinkError>,
    ) -> Result<T, ProtocolError> {
        let settle = self.config.poll.settle_reads.max(1);
        let mut last: Option<T> = None;
        let mut streak = 0;
        for _ in 0..self.config.poll.max_reads() {
            let value = read(&mut *self.link)?;
            if last.as_ref() == Some(&value) {
                streak += 1;
            } else {
                streak = 1;
            }
            if streak >= settle {
                return Ok(value);
            }
            last = Some(value);
            self.pause();
        }
        Err(ProtocolError::Timeout(what))
    }

    /// The cursor once it stops moving.
    pub fn settled_cursor(&mut self) -> Result<Pos, ProtocolError> {
        self.settled("cursor to settle", |link| link.cursor())
    }

    /// Wait until the cursor reads `expected` for `settle_reads` reads in a
    /// row.
    pub fn await_cursor(&mut self, expected: Pos) -> Result<(), ProtocolError> {
        let settle = self.config.poll.settle_reads.max(1);
        let mut observed = None;
        let mut streak = 0;
        for _ in 0..self.config.poll.max_reads() {
            let cursor = self.link.cursor()?;
            observed = Some(cursor);
            if cursor == expected {
                streak += 1;
                if streak >= settle {
                    return Ok(());
                }
            } else {
                streak = 0;
            }
            self.pause();
        }
        Err(ProtocolError::Desync {
            what: "cursor",
            expected: expected.to_string(),
            observed: observed.map_or_else(|| "nothing".to_string(), |p| p.to_string()),
        })
    }

    pub fn move_cursor_to(&mut self, target: Pos) -> Result<(), ProtocolError> {
        let from = self.settled_cursor()?;
        for direction in Direction::path(from, target) {
            self.link.step(direction)?;
        }
        self.await_cursor(target)
    }

    pub fn press(&mut self, directions: &[Direction]) -> Result<(), LinkError> {
        for direction in directions {
            self.link.step(*direction)?;
        }
        Ok(())
    }

    /// Step through a target list until the cursor rests on `target`.
    pub fn cycle_to(&mut self, target: Pos, max_steps: usize) -> Result<(), ProtocolError> {
        let mut cursor = self.settled_cursor()?;
        for _ in 0..max_steps {
            if cursor == target {
                return Ok(());
            }
            self.link.step(Direction::Right)?;
            cursor = self.settled_cursor()?;
        }
        if cursor == target {
            return Ok(());
        }
        Err(ProtocolError::Desync {
            what: "target",
            expected: target.to_string(),
            observed: cursor.to_string(),
        })
    }

    /// No unit selected and the cursor moves freely.
    ///
    /// Checks by stepping once to an in-bounds neighbour and back; menus
    /// swallow sideways steps, so a cursor that does not move means a menu
    /// is open. Vertical steps are only used when the map is one column
    /// wide. A single-tile map has nowhere to step and counts as neutral
    /// whenever no unit is selected.
    pub fn is_neutral(&mut self) -> Result<bool, ProtocolError> {
        if self.settled("selection to settle", |link| Ok(link.unit_maps()?.is_some()))? {
            return Ok(false);
        }
        let terrain = self.link.snapshot()?.terrain;
        let origin = self.settled_cursor()?;
        let Some(direction) = Direction::ALL
            .into_iter()
            .find(|d| terrain.in_bounds(d.step_from(origin)))
        else {
            return Ok(true);
        };
        self.link.step(direction)?;
        let reads = self.config.poll.max_reads();
        let moved = self.poll("cursor to move", reads, |link| {
            let cursor = link.cursor()?;
            Ok((cursor != origin).then_some(cursor))
        });
        match moved {
            Ok(_) => {
                self.link.step(direction.opposite())?;
                self.await_cursor(origin)?;
                Ok(true)
            }
            Err(ProtocolError::Timeout(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Cancel until the map is neutral again.
    pub fn return_to_map(&mut self) -> Result<(), ProtocolError> {
        for press in 0..self.config.cancel_presses {
            if self.is_neutral()? {
                if press > 0 {
                    log::debug!("Back on the map after {} cancel presses", press);
                }
                return Ok(());
            }
            self.link.cancel()?;
        }
        if self.is_neutral()? {
            return Ok(());
        }
        Err(ProtocolError::Desync {
            what: "recovery",
            expected: "neutral map".to_string(),
            observed: "menu or selection still open".to_string(),
        })
    }
}
