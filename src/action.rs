//! Invertible grid edits and the linear history that records them. Every
//! content change flows through an `Action` so it can be undone; barrier
//! and dimension changes deliberately bypass the log.

use crate::clues::{ClueStructure, Slot};
use crate::grid::{Coord, Grid};
use crate::word::{Atom, Word};

/// An invertible edit. `SetCell` records both the new and the previous
/// atom so inversion needs no other context; `Group` applies its children
/// in order and inverts them in reverse.
#[derive(Debug, Clone)]
pub enum Action {
    SetCell {
        coord: Coord,
        new: Atom,
        old: Atom,
    },
    Group(Vec<Action>),
}

impl Action {
    /// A no-op group, useful as a root search node.
    #[must_use]
    pub fn noop() -> Action {
        Action::Group(vec![])
    }

    /// Build the group that writes `word` into `slot`, touching only the
    /// positions whose constraint is currently empty. The word must match
    /// the slot's length and fit its constraints.
    #[must_use]
    pub fn fill_slot(slot: &Slot, word: &Word) -> Action {
        assert_eq!(slot.len(), word.len());
        debug_assert!(slot.fits(word));

        let mut actions = Vec::with_capacity(slot.open_cells());
        for (index, &coord) in slot.cells().iter().enumerate() {
            let old = slot.constraint(index);
            if old.is_empty() {
                actions.push(Action::SetCell {
                    coord,
                    new: word.at(index),
                    old,
                });
            }
        }
        Action::Group(actions)
    }

    /// Build the group that clears every cell of `slot`.
    #[must_use]
    pub fn clear_slot(slot: &Slot) -> Action {
        let actions = slot
            .cells()
            .iter()
            .enumerate()
            .map(|(index, &coord)| Action::SetCell {
                coord,
                new: Atom::EMPTY,
                old: slot.constraint(index),
            })
            .collect();
        Action::Group(actions)
    }

    pub fn apply(&self, grid: &mut Grid, clues: &mut ClueStructure) {
        match self {
            Action::SetCell { coord, new, .. } => clues.set_cell(grid, *coord, *new),
            Action::Group(actions) => {
                for action in actions {
                    action.apply(grid, clues);
                }
            }
        }
    }

    pub fn invert(&self, grid: &mut Grid, clues: &mut ClueStructure) {
        match self {
            Action::SetCell { coord, old, .. } => clues.set_cell(grid, *coord, *old),
            Action::Group(actions) => {
                for action in actions.iter().rev() {
                    action.invert(grid, clues);
                }
            }
        }
    }
}

/// An ordered sequence of applied actions plus a head index. The head
/// points one past the last applied action; pushing below the end of the
/// sequence discards the redo tail.
#[derive(Default)]
pub struct ActionLog {
    stack: Vec<Action>,
    index: usize,
}

impl ActionLog {
    #[must_use]
    pub fn new() -> ActionLog {
        ActionLog::default()
    }

    /// The number of currently applied actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    /// Apply `action` and record it, truncating any redo tail first.
    pub fn apply(&mut self, action: Action, grid: &mut Grid, clues: &mut ClueStructure) {
        action.apply(grid, clues);
        self.stack.truncate(self.index);
        self.stack.push(action);
        self.index += 1;
    }

    /// Step back one action. Returns false when there is nothing to undo.
    pub fn undo(&mut self, grid: &mut Grid, clues: &mut ClueStructure) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.stack[self.index].invert(grid, clues);
        true
    }

    /// Step forward one action. Returns false when there is nothing to
    /// redo.
    pub fn redo(&mut self, grid: &mut Grid, clues: &mut ClueStructure) -> bool {
        if self.index == self.stack.len() {
            return false;
        }
        self.stack[self.index].apply(grid, clues);
        self.index += 1;
        true
    }
}
