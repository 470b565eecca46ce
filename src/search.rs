//! The solvability oracle and the autofill search: an explicit-stack
//! depth-first search over whole-slot fills, wrapped in an outer loop that
//! iteratively relaxes the score floor and the shuffle entropy until a
//! solution appears, the tree is exhausted, or the search is stopped.

use lazy_static::lazy_static;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};

use crate::action::Action;
use crate::engine::Crossword;
use crate::grid::Coord;
use crate::word::Word;

lazy_static! {
    /// Process-wide seed source for the per-call shuffle PRNGs.
    static ref SEED_SOURCE: Mutex<SmallRng> = Mutex::new(SmallRng::from_entropy());
}

fn draw_seed() -> u64 {
    SEED_SOURCE.lock().expect("seed source lock poisoned").gen()
}

/// The oracle's classification of a partial grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Solvability {
    /// Nothing rules this grid out yet.
    Solvable,
    /// Some unfilled slot has no candidate left at the current score floor.
    Overdetermined,
    /// Some filled, unlocked slot holds a word that is not in the index.
    Invalid,
    /// Two filled slots hold the same word.
    Duplicate,
    /// Some filled slot's word scores below the current floor.
    Weak,
}

/// How an autofill run ended. All four are ordinary results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FillOutcome {
    Solved,
    Exhausted,
    Cancelled,
    DeadlineReached,
}

/// Autofill tuning knobs.
#[derive(Debug, Clone)]
pub struct AutofillParams {
    /// Wall-clock budget across all iterations, in seconds.
    pub seconds_limit: u64,

    /// Cap on candidates emitted per expansion; `None` means unlimited.
    pub branching_factor_limit: Option<usize>,

    /// Percentage of each candidate list to shuffle, 0..=100.
    pub entropy: i32,

    /// Multiplier applied to `entropy` between iterations, 0..=1.
    pub entropy_decay: f64,

    /// Minimum acceptable frequency score for filled words, 1..=100.
    pub score_min: i32,

    /// Multiplier applied to `score_min` between iterations, 0..=1.
    pub score_min_decay: f64,

    /// Undo the actions of a failed (or cancelled) run.
    pub rollback: bool,
}

impl Default for AutofillParams {
    fn default() -> AutofillParams {
        AutofillParams {
            seconds_limit: 100,
            branching_factor_limit: None,
            entropy: 100,
            entropy_decay: 0.9,
            score_min: 100,
            score_min_decay: 0.9,
            rollback: true,
        }
    }
}

/// One frame of the explicit DFS stack: an action to try and the log depth
/// it belongs at.
struct DfsNode {
    action: Action,
    depth: usize,
}

impl Crossword {
    /// Classify the current grid against the index at the given score
    /// floor. This is the reject test of the backtracking search, so it
    /// runs on every node.
    pub fn classify(&mut self, score_min: i32) -> Solvability {
        self.refresh_clues();

        for slot in self.clues.slots() {
            if slot.is_filled() {
                if slot.is_locked() {
                    continue;
                }
                let word = slot.to_word();
                if !self.index.contains(word) {
                    return Solvability::Invalid;
                }
                if self.index.freq_score(word).unwrap_or(0) < score_min {
                    return Solvability::Weak;
                }
            } else if !self.index.has_solution(slot.to_word(), score_min) {
                return Solvability::Overdetermined;
            }
        }

        let mut seen: HashSet<&Word> = HashSet::new();
        for slot in self.clues.slots() {
            if slot.is_filled() && !seen.insert(slot.to_word()) {
                return Solvability::Duplicate;
            }
        }

        Solvability::Solvable
    }

    /// True iff every slot is filled with an indexed word.
    pub fn is_solved(&mut self) -> bool {
        self.refresh_clues();
        let index = &self.index;
        self.clues
            .slots()
            .iter()
            .all(|slot| slot.is_filled() && index.contains(slot.to_word()))
    }

    /// Candidate fill actions for the next slot. Slots are visited in
    /// distance-from-origin order (ties broken by row, then across before
    /// down) and only the first unfilled one is expanded; every reachable
    /// fill is still reachable through chains of such single-slot
    /// expansions.
    fn get_word_fills(
        &mut self,
        entropy: i32,
        score_min: i32,
        branching_factor_limit: Option<usize>,
    ) -> Vec<Action> {
        assert!((0..=100).contains(&entropy));
        self.refresh_clues();

        let mut ordered: Vec<_> = self.clues.slots().iter().collect();
        ordered.sort_by_key(|slot| {
            let start = slot.start();
            (start.row + start.col, start.row, slot.direction())
        });

        let Some(slot) = ordered.into_iter().find(|slot| !slot.is_filled()) else {
            return vec![];
        };

        let mut candidates = self.index.get_solutions(slot.to_word(), score_min);

        let shuffle_count =
            ((f64::from(entropy) / 100.0).min(1.0) * candidates.len() as f64) as usize;
        let seed = self.shuffle_seed.unwrap_or_else(draw_seed);
        let mut rng: SmallRng = SeedableRng::seed_from_u64(seed);
        candidates[..shuffle_count].shuffle(&mut rng);

        if let Some(limit) = branching_factor_limit {
            candidates.truncate(limit);
        }

        #[cfg(feature = "check_invariants")]
        assert!(
            candidates.iter().all(|word| slot.fits(word)),
            "trie returned a candidate that contradicts the slot constraints"
        );

        candidates
            .iter()
            .map(|word| Action::fill_slot(slot, word))
            .collect()
    }

    /// Fill the grid from the index. Blocks until the search finishes; use
    /// `stop_autofill` from another thread to cancel. The index must be
    /// loaded, the barrier pattern valid, and the starting grid solvable at
    /// a score floor of 1.
    pub fn autofill(&mut self, params: &AutofillParams) -> FillOutcome {
        assert!(
            self.index.is_loaded(),
            "autofill requires a loaded dictionary"
        );
        assert!(
            self.is_valid_pattern(),
            "autofill requires a valid barrier pattern"
        );
        assert_eq!(
            self.classify(1),
            Solvability::Solvable,
            "autofill requires a solvable starting grid"
        );

        info!("autofilling...");

        self.stop.store(false, Ordering::SeqCst);
        self.done.store(false, Ordering::SeqCst);
        self.deadline_hit.store(false, Ordering::SeqCst);
        self.searching.store(true, Ordering::SeqCst);

        let watchdog = {
            let stop = Arc::clone(&self.stop);
            let done = Arc::clone(&self.done);
            let deadline_hit = Arc::clone(&self.deadline_hit);
            let msecs = params.seconds_limit * 1000;
            thread::spawn(move || {
                for _ in 0..msecs {
                    thread::sleep(Duration::from_millis(1));
                    if done.load(Ordering::SeqCst) || stop.load(Ordering::SeqCst) {
                        return;
                    }
                }
                deadline_hit.store(true, Ordering::SeqCst);
                stop.store(true, Ordering::SeqCst);
            })
        };

        // Lock every currently filled cell for the duration of the search,
        // remembering which ones we have to unlock afterwards.
        let mut preamble_locked: Vec<Coord> = vec![];
        for row in 0..self.height() {
            for col in 0..self.width() {
                let coord = Coord::new(row, col);
                if self.is_filled(coord) {
                    if !self.is_locked(coord) {
                        preamble_locked.push(coord);
                    }
                    self.lock_cell(coord, true);
                }
            }
        }

        let initial_depth = self.log.len();
        let start = Instant::now();
        let mut score_min = params.score_min;
        let mut entropy = params.entropy;
        let mut nodes_searched = 0usize;
        let mut found = false;

        while !found && !self.stop.load(Ordering::SeqCst) && score_min > 0 {
            debug!("searching with minimum score {score_min} and entropy {entropy}");
            if let Some(limit) = params.branching_factor_limit {
                debug!("...with branching factor {limit}");
            }

            // The has-solution memo ignores the score floor, so it has to
            // go before every iteration that changes it.
            self.index.flush_caches();

            let iteration_depth = self.log.len();
            let mut stack = vec![DfsNode {
                action: Action::noop(),
                depth: iteration_depth + 1,
            }];
            let mut complete_search = true;

            while let Some(node) = stack.pop() {
                if self.stop.load(Ordering::SeqCst) {
                    debug!("stopped externally with no solution found");
                    complete_search = false;
                    break;
                }

                // Rewind the log to just below the node, then apply it.
                while self.log.len() > node.depth - 1 {
                    self.undo();
                }
                self.apply(node.action);
                nodes_searched += 1;

                if self.classify(score_min) != Solvability::Solvable {
                    continue;
                }

                if self.is_solved() {
                    info!("found solution");
                    found = true;
                    break;
                }

                let fills =
                    self.get_word_fills(entropy, score_min, params.branching_factor_limit);

                // Reversed so the best candidate ends up on top.
                for action in fills.into_iter().rev() {
                    stack.push(DfsNode {
                        action,
                        depth: node.depth + 1,
                    });
                }
            }

            if !found {
                if complete_search {
                    debug!("full tree search completed without a solution; relaxing constraints");
                }
                if params.rollback {
                    while self.log.len() > initial_depth {
                        self.undo();
                    }

                    #[cfg(feature = "check_invariants")]
                    assert_eq!(
                        self.log.len(),
                        initial_depth,
                        "rollback must restore the starting log size"
                    );
                }
            }

            score_min = (f64::from(score_min) * params.score_min_decay) as i32;
            entropy = (f64::from(entropy) * params.entropy_decay) as i32;
        }

        let elapsed = start.elapsed();
        if nodes_searched > 2 && elapsed.as_millis() > 0 {
            let nodes_per_sec = nodes_searched as f64 / elapsed.as_secs_f64();
            debug!("searched {nodes_searched} nodes ({nodes_per_sec:.0} nodes/sec)");
        }
        if !found {
            info!("autofill finished without finding a solution");
        }

        for &coord in &preamble_locked {
            self.lock_cell(coord, false);
        }

        self.done.store(true, Ordering::SeqCst);
        watchdog.join().ok();
        self.searching.store(false, Ordering::SeqCst);

        if found {
            FillOutcome::Solved
        } else if self.deadline_hit.load(Ordering::SeqCst) {
            FillOutcome::DeadlineReached
        } else if self.stop.load(Ordering::SeqCst) {
            FillOutcome::Cancelled
        } else {
            FillOutcome::Exhausted
        }
    }
}
