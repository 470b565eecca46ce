//! The engine façade: one object owning the grid, the clue structure, the
//! action log, the hint table, and a handle to the word index. External
//! collaborators (views, dialogs, exporters) talk to this type only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::action::{Action, ActionLog};
use crate::clues::{pattern_is_valid, ClueStructure, Direction, Slot};
use crate::grid::{Cell, Coord, Grid};
use crate::word::{Atom, Word};
use crate::word_index::{DictError, WordIndex};

/// A single crossword puzzle under construction.
pub struct Crossword {
    pub(crate) grid: Grid,
    pub(crate) clues: ClueStructure,
    pub(crate) log: ActionLog,
    hints: HashMap<(Coord, Direction), String>,
    pub(crate) index: Arc<WordIndex>,

    /// Cooperative search-cancellation flag, observed at the top of every
    /// search step.
    pub(crate) stop: Arc<AtomicBool>,

    /// Set when a search finishes, successfully or not.
    pub(crate) done: Arc<AtomicBool>,

    /// Set by the deadline watchdog when it fires, so a deadline can be
    /// told apart from an external stop.
    pub(crate) deadline_hit: Arc<AtomicBool>,

    pub(crate) searching: Arc<AtomicBool>,

    /// Fixed candidate-shuffle seed for deterministic tests. `None` draws
    /// from the process-wide source.
    pub(crate) shuffle_seed: Option<u64>,
}

impl Default for Crossword {
    fn default() -> Crossword {
        Crossword::new()
    }
}

impl Crossword {
    #[must_use]
    pub fn new() -> Crossword {
        Crossword::with_index(Arc::new(WordIndex::new()))
    }

    /// Build a crossword sharing an existing word index.
    #[must_use]
    pub fn with_index(index: Arc<WordIndex>) -> Crossword {
        let mut crossword = Crossword {
            grid: Grid::new(),
            clues: ClueStructure::new(),
            log: ActionLog::new(),
            hints: HashMap::new(),
            index,
            stop: Arc::new(AtomicBool::new(false)),
            done: Arc::new(AtomicBool::new(false)),
            deadline_hit: Arc::new(AtomicBool::new(false)),
            searching: Arc::new(AtomicBool::new(false)),
            shuffle_seed: None,
        };
        crossword.refresh_clues();
        crossword
    }

    /// Rebuild the clue structure if a barrier or dimension change has
    /// invalidated it.
    pub(crate) fn refresh_clues(&mut self) {
        self.clues.refresh(&self.grid);
    }

    pub(crate) fn apply(&mut self, action: Action) {
        self.log.apply(action, &mut self.grid, &mut self.clues);
    }

    /* Edits that push to the log. */

    /// Assign `value` to the open cell at `coord`.
    pub fn set(&mut self, coord: Coord, value: Atom) {
        let old = self.grid.get(coord).contents();
        self.refresh_clues();
        self.apply(Action::SetCell {
            coord,
            new: value,
            old,
        });
    }

    /// Fill `slot` with `word`, writing only the currently blank cells.
    pub fn set_slot(&mut self, slot: &Slot, word: &Word) {
        assert!(slot.fits(word), "word does not fit slot constraints");
        self.refresh_clues();
        self.apply(Action::fill_slot(slot, word));
    }

    /// Clear every cell of `slot`.
    pub fn clear_slot(&mut self, slot: &Slot) {
        self.refresh_clues();
        self.apply(Action::clear_slot(slot));
    }

    /// Clear every open cell in the grid, leaving barriers alone.
    pub fn clear_all_atoms(&mut self) {
        self.refresh_clues();
        let mut actions = vec![];
        for row in 0..self.grid.height() {
            for col in 0..self.grid.width() {
                let coord = Coord::new(row, col);
                let cell = self.grid.get(coord);
                if !cell.is_barrier() {
                    actions.push(Action::SetCell {
                        coord,
                        new: Atom::EMPTY,
                        old: cell.contents(),
                    });
                }
            }
        }
        self.apply(Action::Group(actions));
    }

    /// Step back one action. Returns false when the history is exhausted.
    pub fn undo(&mut self) -> bool {
        self.log.undo(&mut self.grid, &mut self.clues)
    }

    /// Step forward one action. Returns false when there is no redo tail.
    pub fn redo(&mut self) -> bool {
        self.log.redo(&mut self.grid, &mut self.clues)
    }

    /* Edits that bypass the log. */

    /// Set or clear the barrier at `coord`, optionally mirroring the edit
    /// onto the rotational pair. Not undoable.
    pub fn set_barrier(&mut self, coord: Coord, value: bool, enforce_symmetry: bool) {
        self.clues.invalidate();
        self.grid.set_barrier(coord, value);
        if enforce_symmetry {
            let pair = self.grid.rotational_pair(coord);
            if pair != coord {
                self.grid.set_barrier(pair, value);
            }
        }
    }

    pub fn toggle_barrier(&mut self, coord: Coord, enforce_symmetry: bool) {
        let value = !self.grid.get(coord).is_barrier();
        self.set_barrier(coord, value, enforce_symmetry);
    }

    /// Resize the grid. Not undoable; cells outside the new rectangle
    /// become unreachable but keep their values.
    pub fn set_dimensions(&mut self, height: usize, width: usize) {
        self.clues.invalidate();
        self.grid.set_dimensions(height, width);
    }

    pub fn lock_cell(&mut self, coord: Coord, value: bool) {
        self.grid.set_locked(coord, value);
        self.clues.refresh_locks(&self.grid, coord);
    }

    pub fn toggle_lock(&mut self, coord: Coord) {
        self.lock_cell(coord, !self.grid.is_locked(coord));
    }

    /* Queries. */

    #[must_use]
    pub fn get(&self, coord: Coord) -> Cell {
        self.grid.get(coord)
    }

    #[must_use]
    pub fn is_in_bounds(&self, coord: Coord) -> bool {
        self.grid.is_in_bounds(coord)
    }

    #[must_use]
    pub fn is_filled(&self, coord: Coord) -> bool {
        self.grid.is_filled(coord)
    }

    #[must_use]
    pub fn is_locked(&self, coord: Coord) -> bool {
        self.grid.is_locked(coord)
    }

    /// True iff no run of open cells in either direction has length exactly
    /// two.
    #[must_use]
    pub fn is_valid_pattern(&self) -> bool {
        pattern_is_valid(&self.grid)
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    /// All slots, across before down.
    pub fn slots(&mut self) -> &[Slot] {
        self.refresh_clues();
        self.clues.slots()
    }

    /// Copies of the slots beginning at `coord`.
    pub fn slots_starting_at(&mut self, coord: Coord) -> Vec<Slot> {
        self.refresh_clues();
        self.clues.slots_starting_at(coord)
    }

    /// The clue number at `coord`, if a slot starts there.
    pub fn clue_number(&mut self, coord: Coord) -> Option<u32> {
        self.refresh_clues();
        self.clues.number_at(coord)
    }

    #[must_use]
    pub fn repr_string(&self) -> String {
        self.grid.repr_string()
    }

    /* Hints. */

    /// The hint for the slot starting at `coord` in `direction`, or the
    /// empty string if none was set.
    #[must_use]
    pub fn hint_at(&self, coord: Coord, direction: Direction) -> &str {
        self.hints
            .get(&(coord, direction))
            .map_or("", String::as_str)
    }

    pub fn set_hint_at(&mut self, coord: Coord, direction: Direction, hint: String) {
        self.hints.insert((coord, direction), hint);
    }

    /// The hint for clue `number` in `direction`, if such a clue exists.
    pub fn hint(&mut self, number: u32, direction: Direction) -> Option<String> {
        self.refresh_clues();
        let start = self
            .clues
            .slots()
            .iter()
            .find(|slot| slot.number() == Some(number) && slot.direction() == direction)
            .map(Slot::start)?;
        Some(self.hint_at(start, direction).to_string())
    }

    pub fn set_hint(&mut self, number: u32, direction: Direction, hint: String) -> bool {
        self.refresh_clues();
        let start = self
            .clues
            .slots()
            .iter()
            .find(|slot| slot.number() == Some(number) && slot.direction() == direction)
            .map(Slot::start);
        match start {
            Some(start) => {
                self.set_hint_at(start, direction, hint);
                true
            }
            None => false,
        }
    }

    /// The hint attached to `slot`.
    #[must_use]
    pub fn hint_for_slot(&self, slot: &Slot) -> &str {
        self.hint_at(slot.start(), slot.direction())
    }

    pub fn set_hint_for_slot(&mut self, slot: &Slot, hint: String) {
        self.set_hint_at(slot.start(), slot.direction(), hint);
    }

    /* Word index delegation. */

    #[must_use]
    pub fn index(&self) -> &Arc<WordIndex> {
        &self.index
    }

    /// Index a single scored word.
    pub fn add_entry(&self, word: Word, freq_score: i32, letter_score: i32) {
        self.index.add_entry(word, freq_score, letter_score);
    }

    #[must_use]
    pub fn contains_entry(&self, word: &Word) -> bool {
        self.index.contains(word)
    }

    #[must_use]
    pub fn freq_score(&self, word: &Word) -> Option<i32> {
        self.index.freq_score(word)
    }

    /// Candidate words for `slot`, unfiltered and in trie order.
    #[must_use]
    pub fn get_solutions(&self, slot: &Slot, score_min: i32) -> Vec<Word> {
        self.index.get_solutions(slot.to_word(), score_min)
    }

    #[must_use]
    pub fn has_solution(&self, slot: &Slot, score_min: i32) -> bool {
        self.index.has_solution(slot.to_word(), score_min)
    }

    pub fn load_dictionary(&self, path: &std::path::Path) -> Result<(), DictError> {
        self.index.load_from_file(path)
    }

    pub fn load_dictionary_deferred(&self, path: std::path::PathBuf) {
        self.index.load_deferred(path);
    }

    pub fn wait_for_load(&self) {
        self.index.wait_for_load();
    }

    #[must_use]
    pub fn is_dictionary_loaded(&self) -> bool {
        self.index.is_loaded()
    }

    pub fn flush_caches(&self) {
        self.index.flush_caches();
    }

    /* Search control. */

    /// Ask an in-flight autofill to stop at its next step. Harmless when no
    /// search is running; idempotent otherwise.
    pub fn stop_autofill(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::SeqCst)
    }

    /// Fix the candidate-shuffle seed so fills are reproducible.
    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(ch: char) -> Atom {
        Atom::from_char(ch).unwrap()
    }

    #[test]
    fn test_set_undo_redo_chain() {
        let mut cw = Crossword::new();

        cw.set(Coord::new(0, 0), atom('C'));
        cw.set(Coord::new(0, 1), atom('A'));

        assert!(cw.undo());
        assert!(cw.get(Coord::new(0, 1)).contents().is_empty());
        assert_eq!(cw.get(Coord::new(0, 0)).contents().to_char(), Some('C'));

        assert!(cw.redo());
        assert_eq!(cw.get(Coord::new(0, 1)).contents().to_char(), Some('A'));

        cw.set(Coord::new(0, 2), atom('T'));
        assert!(cw.undo());
        assert!(cw.undo());
        assert_eq!(cw.get(Coord::new(0, 0)).contents().to_char(), Some('C'));
        assert!(cw.get(Coord::new(0, 1)).contents().is_empty());
        assert!(cw.get(Coord::new(0, 2)).contents().is_empty());
    }

    #[test]
    fn test_set_slot_and_clear_slot() {
        let mut cw = Crossword::new();
        let slot = cw
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();

        cw.set_slot(&slot, &Word::parse("CONGA").unwrap());
        assert_eq!(cw.get(Coord::new(0, 4)).contents().to_char(), Some('A'));

        // Slot copies are snapshots; refetch to see the new constraints.
        let filled = cw
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        assert!(filled.is_filled());
        assert_eq!(filled.to_word().to_string(), "CONGA");

        cw.clear_slot(&filled);
        assert!(cw.get(Coord::new(0, 0)).contents().is_empty());

        // One undo restores the whole word.
        assert!(cw.undo());
        assert_eq!(cw.get(Coord::new(0, 2)).contents().to_char(), Some('N'));
    }

    #[test]
    fn test_clear_all_atoms_is_one_undoable_action() {
        let mut cw = Crossword::new();
        cw.set(Coord::new(1, 1), atom('X'));
        cw.set(Coord::new(2, 2), atom('Y'));

        cw.clear_all_atoms();
        assert!(cw.get(Coord::new(1, 1)).contents().is_empty());
        assert!(cw.get(Coord::new(2, 2)).contents().is_empty());

        assert!(cw.undo());
        assert_eq!(cw.get(Coord::new(1, 1)).contents().to_char(), Some('X'));
        assert_eq!(cw.get(Coord::new(2, 2)).contents().to_char(), Some('Y'));
    }

    #[test]
    fn test_symmetric_barrier_toggle() {
        let mut cw = Crossword::new();
        cw.toggle_barrier(Coord::new(0, 0), true);
        assert!(cw.get(Coord::new(0, 0)).is_barrier());
        assert!(cw.get(Coord::new(4, 4)).is_barrier());

        cw.toggle_barrier(Coord::new(0, 0), true);
        assert!(!cw.get(Coord::new(0, 0)).is_barrier());
        assert!(!cw.get(Coord::new(4, 4)).is_barrier());
    }

    #[test]
    fn test_center_cell_is_its_own_pair() {
        let mut cw = Crossword::new();
        cw.set_barrier(Coord::new(2, 2), true, true);
        assert!(cw.get(Coord::new(2, 2)).is_barrier());
        let barriers = (0..5)
            .flat_map(|r| (0..5).map(move |c| Coord::new(r, c)))
            .filter(|&c| cw.get(c).is_barrier())
            .count();
        assert_eq!(barriers, 1);
    }

    #[test]
    fn test_barrier_edits_are_not_undoable() {
        let mut cw = Crossword::new();
        cw.set_barrier(Coord::new(0, 0), true, false);
        assert!(!cw.undo());
        assert!(cw.get(Coord::new(0, 0)).is_barrier());
    }

    #[test]
    fn test_slots_refresh_after_barrier_change() {
        let mut cw = Crossword::new();
        assert_eq!(cw.slots().len(), 10);

        cw.set_barrier(Coord::new(0, 0), true, true);
        // Row 0 and column 0 shrink to 4-runs; same for row 4/column 4.
        assert_eq!(cw.slots().len(), 10);
        let slot = cw
            .slots_starting_at(Coord::new(0, 1))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        assert_eq!(slot.len(), 4);
    }

    #[test]
    fn test_set_dimensions_twice_is_idempotent() {
        let mut cw = Crossword::new();
        cw.set(Coord::new(0, 0), atom('A'));
        cw.set_dimensions(4, 4);
        let slots_before = cw.slots().len();

        cw.set_dimensions(4, 4);
        assert_eq!(cw.height(), 4);
        assert_eq!(cw.width(), 4);
        assert_eq!(cw.slots().len(), slots_before);
        assert_eq!(cw.get(Coord::new(0, 0)).contents().to_char(), Some('A'));
    }

    #[test]
    fn test_hints_by_coord_number_and_slot() {
        let mut cw = Crossword::new();

        assert_eq!(cw.hint_at(Coord::new(0, 0), Direction::Across), "");

        cw.set_hint_at(Coord::new(0, 0), Direction::Across, "Feline friend".into());
        assert_eq!(
            cw.hint_at(Coord::new(0, 0), Direction::Across),
            "Feline friend"
        );

        // 1-Across starts at (0,0) on an open 5x5.
        assert_eq!(
            cw.hint(1, Direction::Across).as_deref(),
            Some("Feline friend")
        );
        assert_eq!(cw.hint(1, Direction::Down).as_deref(), Some(""));
        assert_eq!(cw.hint(99, Direction::Across), None);

        assert!(cw.set_hint(2, Direction::Down, "Second column".into()));
        assert_eq!(
            cw.hint_at(Coord::new(0, 1), Direction::Down),
            "Second column"
        );
        assert!(!cw.set_hint(99, Direction::Down, "nope".into()));

        let slot = cw
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        assert_eq!(cw.hint_for_slot(&slot), "Feline friend");
    }

    #[test]
    fn test_lock_cell_updates_slot_summary() {
        let mut cw = Crossword::new();
        for col in 0..5 {
            cw.set(Coord::new(0, col), atom('A'));
            cw.lock_cell(Coord::new(0, col), true);
        }
        let slot = cw
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        assert!(slot.is_locked());

        cw.toggle_lock(Coord::new(0, 3));
        let slot = cw
            .slots_starting_at(Coord::new(0, 0))
            .into_iter()
            .find(|s| s.direction() == Direction::Across)
            .unwrap();
        assert!(!slot.is_locked());
    }

    #[test]
    fn test_repr_string() {
        let mut cw = Crossword::new();
        cw.set_dimensions(3, 3);
        cw.set_barrier(Coord::new(0, 0), true, false);
        cw.set(Coord::new(1, 1), atom('Q'));
        assert_eq!(cw.repr_string(), "\n|=| | |\n| |Q| |\n| | | |\n");
    }

    #[test]
    fn test_add_entry_and_lookup() {
        let cw = Crossword::new();
        let cat = Word::parse("CAT").unwrap();
        cw.add_entry(cat.clone(), 75, crate::word_index::letter_score(&cat));
        assert!(cw.contains_entry(&cat));
        assert_eq!(cw.freq_score(&cat), Some(75));
        assert!(!cw.contains_entry(&Word::parse("DOG").unwrap()));
    }
}
