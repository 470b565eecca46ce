//! The derived clue structure: slot enumeration, numbering, and the
//! per-cell back-references that let content edits update slot constraints
//! in place. The structure is invalidated by barrier and dimension changes
//! and rebuilt lazily on the next read; plain content edits only touch the
//! mirrored constraint atoms.

use smallvec::SmallVec;
use std::fmt;

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

use crate::grid::{Coord, Grid};
use crate::word::{Atom, Word};
use crate::MAX_DIM;

/// The direction a slot is facing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Across,
    Down,
}

/// An index into `ClueStructure::slots`.
pub type SlotId = usize;

/// A maximal run of at least three open cells in one direction, together
/// with the derived data the engine needs: the mirrored constraint word,
/// the clue number, and the lock summary.
#[derive(Debug, Clone)]
pub struct Slot {
    direction: Direction,
    start: Coord,
    cells: Vec<Coord>,
    constraints: Word,
    number: Option<u32>,
    locked: bool,
}

impl Slot {
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn start(&self) -> Coord {
        self.start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True iff no cell of the slot holds a letter.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.open_cells() == self.len()
    }

    /// The slot's cell coordinates in order from start to end.
    #[must_use]
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    /// The clue number, or `None` if numbering has not been assigned.
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        self.number
    }

    /// True iff every cell in the slot is locked and holds a letter.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The constraint atom at position `index`.
    #[must_use]
    pub fn constraint(&self, index: usize) -> Atom {
        self.constraints.at(index)
    }

    /// The current contents of the slot as a (possibly partial) word.
    #[must_use]
    pub fn to_word(&self) -> &Word {
        &self.constraints
    }

    /// True iff the slot has no empty cells.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.len() > 0 && self.constraints.is_complete()
    }

    /// The number of unconstrained positions.
    #[must_use]
    pub fn open_cells(&self) -> usize {
        self.constraints.open_count()
    }

    /// True iff `word` agrees with every non-empty constraint.
    #[must_use]
    pub fn fits(&self, word: &Word) -> bool {
        assert_eq!(self.len(), word.len());
        (0..self.len()).all(|i| {
            let constraint = self.constraints.at(i);
            constraint.is_empty() || constraint == word.at(i)
        })
    }

    /// The position of `coord` within the slot, if the slot contains it.
    #[must_use]
    pub fn index_of(&self, coord: Coord) -> Option<usize> {
        self.cells.iter().position(|&c| c == coord)
    }

    /// True iff the two slots cover exactly the same cells.
    #[must_use]
    pub fn same_cells(&self, other: &Slot) -> bool {
        self.cells == other.cells
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slot{{number={:?}, start={}, len={}, {:?}, constraints=|{}|}}",
            self.number,
            self.start,
            self.len(),
            self.direction,
            self.constraints,
        )
    }
}

/// Scan the grid in `direction` and emit every run of consecutive open
/// cells, regardless of length. Runs end at barriers and grid edges.
fn enumerate_runs(grid: &Grid, direction: Direction) -> Vec<Slot> {
    let (outer_max, inner_max) = match direction {
        Direction::Across => (grid.height(), grid.width()),
        Direction::Down => (grid.width(), grid.height()),
    };

    let coord_at = |outer: usize, inner: usize| match direction {
        Direction::Across => Coord::new(outer, inner),
        Direction::Down => Coord::new(inner, outer),
    };

    let mut runs = vec![];

    for outer in 0..outer_max {
        let mut cells: Vec<Coord> = vec![];
        let mut constraints = Word::new();

        // One past the end so the last run is flushed by the same arm.
        for inner in 0..=inner_max {
            let coord = (inner < inner_max).then(|| coord_at(outer, inner));
            let open = coord.map_or(false, |c| !grid.get(c).is_barrier());

            if open {
                let coord = coord.unwrap();
                cells.push(coord);
                constraints.push(grid.get(coord).contents());
            } else if !cells.is_empty() {
                runs.push(Slot {
                    direction,
                    start: cells[0],
                    cells: std::mem::take(&mut cells),
                    constraints: std::mem::take(&mut constraints),
                    number: None,
                    locked: false,
                });
            }
        }
    }

    runs
}

/// True iff no run in either direction has length exactly two. Length-1
/// runs are isolated cells and are tolerated; length-2 runs make the
/// barrier pattern unusable.
#[must_use]
pub fn pattern_is_valid(grid: &Grid) -> bool {
    enumerate_runs(grid, Direction::Across)
        .iter()
        .chain(enumerate_runs(grid, Direction::Down).iter())
        .all(|run| run.len() != 2)
}

/// The derived slot structure. Owned by the engine; rebuilt from the grid
/// whenever `dirty` is observed set.
pub struct ClueStructure {
    /// All length-≥3 slots: across slots in row-major order, then down
    /// slots in column-major order.
    slots: Vec<Slot>,

    /// Clue number per cell, `None` where no slot starts.
    numbers: Vec<Option<u32>>,

    /// For each cell, the indices of the (at most two) slots containing it.
    containing: Vec<SmallVec<[SlotId; 2]>>,

    dirty: bool,
}

impl Default for ClueStructure {
    fn default() -> ClueStructure {
        ClueStructure::new()
    }
}

impl ClueStructure {
    #[must_use]
    pub fn new() -> ClueStructure {
        ClueStructure {
            slots: vec![],
            numbers: vec![None; MAX_DIM * MAX_DIM],
            containing: vec![SmallVec::new(); MAX_DIM * MAX_DIM],
            dirty: true,
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the structure stale. Called by every barrier or dimension
    /// mutation.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Rebuild from the grid if stale.
    pub fn refresh(&mut self, grid: &Grid) {
        if self.dirty {
            self.rebuild(grid);
        }
    }

    fn rebuild(&mut self, grid: &Grid) {
        self.slots = enumerate_runs(grid, Direction::Across)
            .into_iter()
            .chain(enumerate_runs(grid, Direction::Down))
            .filter(|run| run.len() >= 3)
            .collect();

        for slot in &mut self.slots {
            slot.locked = slot
                .cells
                .iter()
                .all(|&c| grid.is_locked(c) && grid.is_filled(c));
        }

        for entry in &mut self.numbers {
            *entry = None;
        }
        for entry in &mut self.containing {
            entry.clear();
        }

        for (id, slot) in self.slots.iter().enumerate() {
            for &coord in &slot.cells {
                self.containing[coord.row * MAX_DIM + coord.col].push(id);
            }
        }

        // Row-major numbering: each cell that starts at least one slot
        // takes the next number; co-starting across and down slots share.
        let mut next_number = 1;
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let coord = Coord::new(row, col);
                let starting: Vec<SlotId> = self.containing[row * MAX_DIM + col]
                    .iter()
                    .copied()
                    .filter(|&id| self.slots[id].start == coord)
                    .collect();
                if !starting.is_empty() {
                    self.numbers[row * MAX_DIM + col] = Some(next_number);
                    for id in starting {
                        self.slots[id].number = Some(next_number);
                    }
                    next_number += 1;
                }
            }
        }

        self.dirty = false;
    }

    /// All slots. The structure must be fresh.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        assert!(!self.dirty, "reading a stale clue structure");
        &self.slots
    }

    /// The indices of the slots containing `coord`.
    #[must_use]
    pub fn slots_containing(&self, coord: Coord) -> &[SlotId] {
        assert!(!self.dirty, "reading a stale clue structure");
        &self.containing[coord.row * MAX_DIM + coord.col]
    }

    /// Copies of the slots that begin at `coord` (at most one per
    /// direction).
    #[must_use]
    pub fn slots_starting_at(&self, coord: Coord) -> Vec<Slot> {
        assert!(!self.dirty, "reading a stale clue structure");
        self.containing[coord.row * MAX_DIM + coord.col]
            .iter()
            .filter(|&&id| self.slots[id].start == coord)
            .map(|&id| self.slots[id].clone())
            .collect()
    }

    /// The clue number assigned to `coord`, if a slot starts there.
    #[must_use]
    pub fn number_at(&self, coord: Coord) -> Option<u32> {
        assert!(!self.dirty, "reading a stale clue structure");
        self.numbers[coord.row * MAX_DIM + coord.col]
    }

    /// Write `value` into the grid at `coord` and mirror it into the
    /// constraints of every slot containing the cell. When the structure is
    /// stale the mirror step is skipped; the rebuild will resnapshot
    /// constraints anyway.
    pub fn set_cell(&mut self, grid: &mut Grid, coord: Coord, value: Atom) {
        grid.set_contents(coord, value);
        if self.dirty {
            return;
        }
        let ids = self.containing[coord.row * MAX_DIM + coord.col].clone();
        for id in ids {
            let slot = &mut self.slots[id];
            if let Some(index) = slot.index_of(coord) {
                slot.constraints.set(index, value);
            }
        }
    }

    /// Recompute the lock summary of every slot containing `coord` after a
    /// cell lock change.
    pub fn refresh_locks(&mut self, grid: &Grid, coord: Coord) {
        if self.dirty {
            return;
        }
        let ids = self.containing[coord.row * MAX_DIM + coord.col].clone();
        for id in ids {
            let locked = self.slots[id]
                .cells
                .iter()
                .all(|&c| grid.is_locked(c) && grid.is_filled(c));
            self.slots[id].locked = locked;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(grid: &Grid) -> ClueStructure {
        let mut clues = ClueStructure::new();
        clues.refresh(grid);
        clues
    }

    #[test]
    fn test_open_grid_slots() {
        let mut grid = Grid::new();
        grid.set_dimensions(3, 4);
        let clues = fresh(&grid);

        // 3 across runs of length 4, 4 down runs of length 3.
        assert_eq!(clues.slots().len(), 7);
        let across: Vec<_> = clues
            .slots()
            .iter()
            .filter(|s| s.direction() == Direction::Across)
            .collect();
        assert_eq!(across.len(), 3);
        assert!(across.iter().all(|s| s.len() == 4));
    }

    #[test]
    fn test_across_precede_down_and_scan_order() {
        let grid = Grid::new();
        let clues = fresh(&grid);
        let directions: Vec<_> = clues.slots().iter().map(Slot::direction).collect();
        let first_down = directions
            .iter()
            .position(|&d| d == Direction::Down)
            .unwrap();
        assert!(directions[..first_down]
            .iter()
            .all(|&d| d == Direction::Across));
        assert!(directions[first_down..]
            .iter()
            .all(|&d| d == Direction::Down));
    }

    #[test]
    fn test_barriers_split_runs_and_short_runs_dropped() {
        let mut grid = Grid::new();
        // Row 0: barrier at col 3 leaves a 3-run and an isolated cell.
        grid.set_barrier(Coord::new(0, 3), true);
        let clues = fresh(&grid);

        let row0: Vec<_> = clues
            .slots()
            .iter()
            .filter(|s| s.direction() == Direction::Across && s.start().row == 0)
            .collect();
        assert_eq!(row0.len(), 1);
        assert_eq!(row0[0].len(), 3);
        assert_eq!(row0[0].start(), Coord::new(0, 0));
    }

    #[test]
    fn test_numbering_shared_and_monotonic() {
        let grid = Grid::new();
        let clues = fresh(&grid);

        // (0,0) starts both 1-Across and 1-Down.
        let starting = clues.slots_starting_at(Coord::new(0, 0));
        assert_eq!(starting.len(), 2);
        assert!(starting.iter().all(|s| s.number() == Some(1)));

        // Remaining top-row cells each start only a down slot: 2..=5.
        for col in 1..5 {
            assert_eq!(clues.number_at(Coord::new(0, col)), Some(col as u32 + 1));
        }
        // Later rows start only across slots.
        assert_eq!(clues.number_at(Coord::new(1, 0)), Some(6));
        assert_eq!(clues.number_at(Coord::new(1, 1)), None);

        // Numbers increase in row-major order over slot starts.
        let mut numbered: Vec<(Coord, u32)> = vec![];
        for row in 0..5 {
            for col in 0..5 {
                if let Some(n) = clues.number_at(Coord::new(row, col)) {
                    numbered.push((Coord::new(row, col), n));
                }
            }
        }
        let numbers: Vec<u32> = numbered.iter().map(|&(_, n)| n).collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn test_pattern_validity() {
        let mut grid = Grid::new();
        assert!(pattern_is_valid(&grid));

        // A barrier at (0,2) leaves cols 3..=4 as a length-2 run.
        grid.set_barrier(Coord::new(0, 2), true);
        assert!(!pattern_is_valid(&grid));

        grid.set_barrier(Coord::new(0, 2), false);
        assert!(pattern_is_valid(&grid));
    }

    #[test]
    fn test_all_barrier_grid_has_no_slots_and_valid_pattern() {
        let mut grid = Grid::new();
        for row in 0..5 {
            for col in 0..5 {
                grid.set_barrier(Coord::new(row, col), true);
            }
        }
        assert!(pattern_is_valid(&grid));
        let clues = fresh(&grid);
        assert!(clues.slots().is_empty());
    }

    #[test]
    fn test_constraint_mirroring() {
        let mut grid = Grid::new();
        let mut clues = ClueStructure::new();
        clues.refresh(&grid);

        let coord = Coord::new(0, 1);
        clues.set_cell(&mut grid, coord, Atom::from_char('K').unwrap());

        for &id in clues.slots_containing(coord) {
            let slot = &clues.slots()[id];
            let index = slot.index_of(coord).unwrap();
            assert_eq!(slot.constraint(index).to_char(), Some('K'));
        }
        // Unrelated slots untouched.
        let other = clues.slots_starting_at(Coord::new(1, 0));
        assert!(other[0].to_word().open_count() == 5);
    }

    #[test]
    fn test_lock_summary() {
        let mut grid = Grid::new();
        let mut clues = ClueStructure::new();
        clues.refresh(&grid);

        // Fill and lock the whole top row.
        for col in 0..5 {
            let coord = Coord::new(0, col);
            clues.set_cell(&mut grid, coord, Atom::from_char('A').unwrap());
            grid.set_locked(coord, true);
            clues.refresh_locks(&grid, coord);
        }

        let top = &clues.slots_starting_at(Coord::new(0, 0));
        let across = top
            .iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        let down = top
            .iter()
            .find(|s| s.direction() == Direction::Down)
            .unwrap();
        assert!(across.is_locked());
        // Down slot has unlocked empty cells below the top row.
        assert!(!down.is_locked());
    }

    #[test]
    fn test_fits_and_filled() {
        let mut grid = Grid::new();
        let mut clues = ClueStructure::new();
        clues.refresh(&grid);

        clues.set_cell(&mut grid, Coord::new(0, 0), Atom::from_char('C').unwrap());
        let slot = clues
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();

        assert!(slot.fits(&Word::parse("CONGA").unwrap()));
        assert!(!slot.fits(&Word::parse("TANGO").unwrap()));
        assert!(!slot.is_filled());
        assert_eq!(slot.open_cells(), 4);
    }
}
