//! The two collaborator seams to the game process.
//!
//! [`InputDevice`] delivers exactly four primitives; everything else
//! (multi-step cursor movement, menu traversal) is built on top of them by
//! [`crate::navigate::Navigator`]. [`StateSource`] exposes the process's
//! memory as immutable snapshots.

use crate::error::LinkError;
use emblem_core::{BattleProjection, Pos, Snapshot, UnitMaps};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Sideways first, then vertical.
    pub const ALL: [Direction; 4] = [Self::Left, Self::Right, Self::Up, Self::Down];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// The tile one step from `pos`.
    pub fn step_from(self, pos: Pos) -> Pos {
        let (dx, dy) = self.delta();
        Pos::new(pos.x + dx, pos.y + dy)
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Steps from `from` to `to`, horizontal leg first.
    pub fn path(from: Pos, to: Pos) -> Vec<Direction> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let horizontal = if dx < 0 { Self::Left } else { Self::Right };
        let vertical = if dy < 0 { Self::Up } else { Self::Down };
        std::iter::repeat_n(horizontal, dx.unsigned_abs() as usize)
            .chain(std::iter::repeat_n(vertical, dy.unsigned_abs() as usize))
            .collect()
    }
}

pub trait InputDevice {
    fn step(&mut self, direction: Direction) -> Result<(), LinkError>;
    fn confirm(&mut self) -> Result<(), LinkError>;
    fn cancel(&mut self) -> Result<(), LinkError>;
    fn cursor(&mut self) -> Result<Pos, LinkError>;
}

pub trait StateSource {
    fn snapshot(&mut self) -> Result<Snapshot, LinkError>;
    /// Movement and range maps of the currently selected unit, if any.
    fn unit_maps(&mut self) -> Result<Option<UnitMaps>, LinkError>;
    /// The combat preview currently on screen, if any.
    fn battle_projection(&mut self) -> Result<Option<BattleProjection>, LinkError>;
}

/// Everything the engine needs from the game process.
pub trait GameLink: InputDevice + StateSource {}

impl<T: InputDevice + StateSource + ?Sized> GameLink for T {}

impl<T: InputDevice + ?Sized> InputDevice for &mut T {
    fn step(&mut self, direction: Direction) -> Result<(), LinkError> {
        (**self).step(direction)
    }

    fn confirm(&mut self) -> Result<(), LinkError> {
        (**self).confirm()
    }

    fn cancel(&mut self) -> Result<(), LinkError> {
        (**self).cancel()
    }

    fn cursor(&mut self) -> Result<Pos, LinkError> {
        (**self).cursor()
    }
}

impl<T: StateSource + ?Sized> StateSource for &mut T {
    fn snapshot(&mut self) -> Result<Snapshot, LinkError> {
        (**self).snapshot()
    }

    fn unit_maps(&mut self) -> Result<Option<UnitMaps>, LinkError> {
        (**self).unit_maps()
    }

    fn battle_projection(&mut self) -> Result<Option<BattleProjection>, LinkError> {
        (**self).battle_projection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_horizontal_first() {
        use Direction::*;
        assert_eq!(
            Direction::path(Pos::new(3, 1), Pos::new(1, 3)),
            vec![Left, Left, Down, Down]
        );
        assert!(Direction::path(Pos::new(2, 2), Pos::new(2, 2)).is_empty());
    }

    #[test]
    fn test_path_lands_on_target() {
        let from = Pos::new(4, 0);
        let to = Pos::new(0, 5);
        let end = Direction::path(from, to).into_iter().fold(from, |p, d| {
            let (dx, dy) = d.delta();
            Pos::new(p.x + dx, p.y + dy)
        });
        assert_eq!(end, to);
    }

    #[test]
    fn test_opposite_cancels_delta() {
        for d in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            let (a, b) = d.delta();
            let (c, e) = d.opposite().delta();
            assert_eq!((a + c, b + e), (0, 0));
        }
    }
}
