//! The persisted puzzle format: line-oriented text with the width and
//! height up front and one comma-delimited row of cell tokens per grid
//! row (`-` barrier, space empty, `A`..`Z` letter). Hints are not
//! persisted in this revision.
//!
//! Parsing is two-phase so a malformed file never leaves the engine in a
//! half-loaded state.

use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::engine::Crossword;
use crate::grid::Coord;
use crate::word::Atom;
use crate::MAX_DIM;

const DELIM: char = ',';
const BARRIER: char = '-';
const BLANK: char = ' ';

#[derive(Debug, Clone)]
pub enum PuzzleError {
    InvalidPath(String),
    MalformedHeader(String),
    BadDimensions(usize, usize),
    MalformedRow(usize),
    BadCell(char),
}

impl fmt::Display for PuzzleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            PuzzleError::InvalidPath(path) => format!("Can’t read puzzle: “{path}”"),
            PuzzleError::MalformedHeader(line) => {
                format!("Puzzle header is not a dimension: “{line}”")
            }
            PuzzleError::BadDimensions(height, width) => {
                format!("Puzzle dimensions {height}x{width} are out of range")
            }
            PuzzleError::MalformedRow(row) => format!("Puzzle row {row} is malformed"),
            PuzzleError::BadCell(ch) => format!("Puzzle contains invalid cell token: “{ch}”"),
        };
        write!(f, "{string}")
    }
}

/// One parsed cell token.
#[derive(Clone, Copy)]
enum CellToken {
    Barrier,
    Blank,
    Letter(Atom),
}

struct ParsedPuzzle {
    height: usize,
    width: usize,
    rows: Vec<Vec<CellToken>>,
}

fn parse_dimension(lines: &[String], index: usize) -> Result<usize, PuzzleError> {
    let line = lines
        .get(index)
        .ok_or_else(|| PuzzleError::MalformedHeader(String::new()))?;
    line.trim()
        .parse()
        .map_err(|_| PuzzleError::MalformedHeader(line.clone()))
}

fn parse_puzzle(lines: &[String]) -> Result<ParsedPuzzle, PuzzleError> {
    let width = parse_dimension(lines, 0)?;
    let height = parse_dimension(lines, 1)?;

    if !(3..=MAX_DIM).contains(&height) || !(3..=MAX_DIM).contains(&width) {
        return Err(PuzzleError::BadDimensions(height, width));
    }

    let mut rows = Vec::with_capacity(height);
    for row in 0..height {
        let line = lines
            .get(2 + row)
            .ok_or(PuzzleError::MalformedRow(row))?;

        let mut cells = Vec::with_capacity(width);
        for ch in line.chars() {
            if ch == DELIM {
                continue;
            }
            if cells.len() >= width {
                return Err(PuzzleError::MalformedRow(row));
            }
            cells.push(match ch {
                BARRIER => CellToken::Barrier,
                BLANK => CellToken::Blank,
                _ => CellToken::Letter(Atom::from_char(ch).ok_or(PuzzleError::BadCell(ch))?),
            });
        }

        if cells.len() != width {
            return Err(PuzzleError::MalformedRow(row));
        }
        rows.push(cells);
    }

    Ok(ParsedPuzzle {
        height,
        width,
        rows,
    })
}

impl Crossword {
    /// Render the puzzle as lines of the persisted format.
    #[must_use]
    pub fn serialize(&self) -> Vec<String> {
        let mut lines = vec![self.width().to_string(), self.height().to_string()];
        for row in 0..self.height() {
            let mut line = String::new();
            for col in 0..self.width() {
                let cell = self.get(Coord::new(row, col));
                if cell.is_barrier() {
                    line.push(BARRIER);
                } else {
                    line.push(cell.contents().to_char().unwrap_or(BLANK));
                }
                line.push(DELIM);
            }
            lines.push(line);
        }
        lines
    }

    /// Replace the grid with the puzzle described by `lines`. On error the
    /// engine keeps its previous state.
    pub fn deserialize(&mut self, lines: &[String]) -> Result<(), PuzzleError> {
        let parsed = parse_puzzle(lines)?;

        self.set_dimensions(parsed.height, parsed.width);
        for row in 0..parsed.height {
            for col in 0..parsed.width {
                self.set_barrier(Coord::new(row, col), false, false);
            }
        }
        self.clear_all_atoms();

        for (row, cells) in parsed.rows.iter().enumerate() {
            for (col, token) in cells.iter().enumerate() {
                let coord = Coord::new(row, col);
                match token {
                    CellToken::Barrier => self.set_barrier(coord, true, false),
                    CellToken::Blank => {}
                    CellToken::Letter(atom) => self.set(coord, *atom),
                }
            }
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), PuzzleError> {
        let contents = self.serialize().join("\n");
        fs::write(path, contents).map_err(|_| {
            let error = PuzzleError::InvalidPath(path.display().to_string());
            warn!("{error}");
            error
        })
    }

    pub fn load_from_puzzle_file(&mut self, path: &Path) -> Result<(), PuzzleError> {
        let contents = fs::read_to_string(path).map_err(|_| {
            let error = PuzzleError::InvalidPath(path.display().to_string());
            warn!("{error}");
            error
        })?;
        let lines: Vec<String> = contents.lines().map(str::to_string).collect();
        self.deserialize(&lines).map_err(|error| {
            warn!("{error}");
            error
        })
    }
}
