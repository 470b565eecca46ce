//! The 27-symbol cell alphabet and the words built from it. An `Atom` is
//! either one of the 26 letters or the empty symbol; a `Word` is an ordered
//! sequence of atoms and may be partial (empty atoms act as wildcards in
//! queries).

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;

use crate::MAX_SLOT_LENGTH;

/// The number of valid cell contents: the empty symbol plus A..Z.
pub const ATOM_COUNT: usize = 27;

/// The code of the empty symbol.
pub const EMPTY_CODE: u8 = 0;

/// A single cell symbol, stored as its stable code (0 = empty, 1..=26 =
/// A..=Z). Value-typed and totally ordered by code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom(u8);

impl Atom {
    pub const EMPTY: Atom = Atom(EMPTY_CODE);

    /// Build an atom from its code. Codes outside 0..=26 are a programmer
    /// error.
    #[must_use]
    pub fn from_code(code: u8) -> Atom {
        assert!((code as usize) < ATOM_COUNT, "invalid atom code {code}");
        Atom(code)
    }

    /// Build an atom from an uppercase letter, or `None` if the character
    /// is outside A..=Z.
    #[must_use]
    pub fn from_char(ch: char) -> Option<Atom> {
        if ch.is_ascii_uppercase() {
            Some(Atom(ch as u8 - b'A' + 1))
        } else {
            None
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == EMPTY_CODE
    }

    /// The letter this atom represents, or `None` for the empty symbol.
    #[must_use]
    pub fn to_char(self) -> Option<char> {
        if self.is_empty() {
            None
        } else {
            Some((self.0 - 1 + b'A') as char)
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(ch) => write!(f, "{ch}"),
            None => Ok(()),
        }
    }
}

/// An ordered sequence of atoms. A word is *complete* when it contains no
/// empty atoms and *partial* otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Word {
    atoms: SmallVec<[Atom; MAX_SLOT_LENGTH]>,
}

impl Word {
    #[must_use]
    pub fn new() -> Word {
        Word::default()
    }

    /// A word of `len` empty atoms.
    #[must_use]
    pub fn empty(len: usize) -> Word {
        Word {
            atoms: (0..len).map(|_| Atom::EMPTY).collect(),
        }
    }

    /// Parse an uppercase string into a complete word. Spaces become empty
    /// atoms; any other character outside A..=Z yields `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Word> {
        let mut atoms = SmallVec::new();
        for ch in s.chars() {
            if ch == ' ' {
                atoms.push(Atom::EMPTY);
            } else {
                atoms.push(Atom::from_char(ch)?);
            }
        }
        Some(Word { atoms })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    #[must_use]
    pub fn at(&self, index: usize) -> Atom {
        self.atoms[index]
    }

    pub fn set(&mut self, index: usize, value: Atom) {
        self.atoms[index] = value;
    }

    pub fn push(&mut self, value: Atom) {
        self.atoms.push(value);
    }

    /// True iff the word contains no empty atoms.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.atoms.iter().all(|a| !a.is_empty())
    }

    /// True iff the word contains at least one empty atom.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.is_complete()
    }

    /// The number of empty atoms in the word.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_empty()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Atom> + '_ {
        self.atoms.iter().copied()
    }
}

impl FromIterator<Atom> for Word {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Word {
        Word {
            atoms: iter.into_iter().collect(),
        }
    }
}

impl Ord for Word {
    /// Lexicographic order: first by length, then by atom code.
    fn cmp(&self, other: &Word) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.atoms.cmp(&other.atoms))
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Word) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Word {
    /// Letters for filled atoms, spaces for empty ones.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for atom in &self.atoms {
            match atom.to_char() {
                Some(ch) => write!(f, "{ch}")?,
                None => write!(f, " ")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    #[test]
    fn test_atom_codes() {
        assert_eq!(Atom::EMPTY.code(), 0);
        assert!(Atom::EMPTY.is_empty());
        assert_eq!(Atom::from_char('A').unwrap().code(), 1);
        assert_eq!(Atom::from_char('Z').unwrap().code(), 26);
        assert_eq!(Atom::from_char('Q').unwrap().to_char(), Some('Q'));
        assert!(Atom::from_char('a').is_none());
        assert!(Atom::from_char('-').is_none());
    }

    #[test]
    fn test_atom_ordering_follows_codes() {
        let a = Atom::from_char('A').unwrap();
        let b = Atom::from_char('B').unwrap();
        assert!(Atom::EMPTY < a);
        assert!(a < b);
    }

    #[test]
    fn test_word_parse_and_display() {
        let word = Word::parse("CAT").unwrap();
        assert_eq!(word.len(), 3);
        assert!(word.is_complete());
        assert_eq!(word.to_string(), "CAT");

        let partial = Word::parse("C T").unwrap();
        assert!(partial.is_partial());
        assert_eq!(partial.open_count(), 1);
        assert_eq!(partial.to_string(), "C T");

        assert!(Word::parse("ca t").is_none());
    }

    #[test]
    fn test_word_ordering_by_length_then_code() {
        let cat = Word::parse("CAT").unwrap();
        let car = Word::parse("CAR").unwrap();
        let cats = Word::parse("CATS").unwrap();

        assert!(car < cat); // R < T
        assert!(cat < cats); // shorter first
        assert_eq!(cat.cmp(&cat), Ordering::Equal);
    }

    #[test]
    fn test_word_equality_and_hash_agree() {
        let hash = |word: &Word| {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            hasher.finish()
        };

        let a = Word::parse("TRICKLE").unwrap();
        let b = Word::parse("TRICKLE").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, Word::parse("TRICKLES").unwrap());
    }

    #[test]
    fn test_empty_word_constructor() {
        let word = Word::empty(4);
        assert_eq!(word.len(), 4);
        assert_eq!(word.open_count(), 4);
        assert!(word.is_partial());
    }
}
