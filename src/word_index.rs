//! The scored word index: one store per word length, each holding a
//! letter-score-ordered entry list, a score lookup map, a prefix tree for
//! wildcard queries, and a bounded has-solution memo. Loading happens under
//! a single writer lock so queries can wait for a deferred load to finish.

use fancy_regex::Regex;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::word::{Atom, Word, ATOM_COUNT};
use crate::MAX_DIM;

/// Relative frequency of each letter, measured over the stock dictionary.
/// Index 0 is the empty symbol, which never scores.
const ATOM_SCORES: [f64; ATOM_COUNT] = [
    0.0,
    0.09062575314771874,
    0.02097899760363229,
    0.03434604298486668,
    0.037221082553848074,
    0.11781545127357801,
    0.016996862225737236,
    0.025051385357254,
    0.032380546802375045,
    0.06766254035033298,
    0.0028382700825742386,
    0.013840703219770217,
    0.05106980820701622,
    0.02758446870264884,
    0.06579765885337364,
    0.07380371311644462,
    0.026900221987417483,
    0.0014162937627920208,
    0.07111285524755726,
    0.07549811790369804,
    0.07228279345142133,
    0.028721314368746472,
    0.009132871887421193,
    0.014259541096753555,
    0.002845289711797423,
    0.017204776957966794,
    0.002612639143257596,
];

lazy_static! {
    /// One dictionary entry per line: an uppercase word and a raw
    /// non-negative frequency, whitespace separated.
    static ref DICT_LINE: Regex = Regex::new(r"^([A-Z]+)\s+(\d+)$").unwrap();
}

/// The branching heuristic behind candidate ordering: common letters are
/// good, and so is letter diversity, since varied letters constrain the
/// crossing slots less.
#[must_use]
pub fn letter_score(word: &Word) -> i32 {
    let mut sum = 0.0;
    let mut seen: u32 = 0;
    for atom in word.iter() {
        sum += ATOM_SCORES[atom.code() as usize] * 1000.0;
        if !atom.is_empty() {
            seen |= 1 << atom.code();
        }
    }
    (sum * f64::from(seen.count_ones())) as i32
}

/// True iff `partial` is compatible with the complete `candidate`: equal
/// lengths and every non-empty atom matching.
#[must_use]
pub fn matches(partial: &Word, candidate: &Word) -> bool {
    partial.len() == candidate.len()
        && partial
            .iter()
            .zip(candidate.iter())
            .all(|(p, c)| p.is_empty() || p == c)
}

#[derive(Debug, Clone)]
pub enum DictError {
    InvalidPath(String),
    InvalidLine(String),
    InvalidScore(String),
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            DictError::InvalidPath(path) => format!("Can’t read dictionary: “{path}”"),
            DictError::InvalidLine(line) => {
                format!("Dictionary contains invalid line: “{line}”")
            }
            DictError::InvalidScore(score) => {
                format!("Dictionary contains invalid score: “{score}”")
            }
        };
        write!(f, "{string}")
    }
}

/// A node in a per-length prefix tree. The root holds the empty atom; no
/// two siblings share a value; complete words are stored at the terminal
/// nodes they end on (all of which sit at the same depth within one store).
struct TrieNode {
    value: Atom,
    children: Vec<TrieNode>,
    terminal: Option<Word>,
}

impl TrieNode {
    fn new(value: Atom) -> TrieNode {
        TrieNode {
            value,
            children: vec![],
            terminal: None,
        }
    }

    fn child(&self, value: Atom) -> Option<&TrieNode> {
        self.children.iter().find(|child| child.value == value)
    }

    fn find_into(&self, partial: &Word, depth: usize, out: &mut Vec<Word>) {
        let target = partial.at(depth);
        if depth == partial.len() - 1 {
            if target.is_empty() {
                out.extend(
                    self.children
                        .iter()
                        .filter_map(|child| child.terminal.clone()),
                );
            } else if let Some(child) = self.child(target) {
                out.extend(child.terminal.clone());
            }
            return;
        }

        if target.is_empty() {
            for child in &self.children {
                child.find_into(partial, depth + 1, out);
            }
        } else if let Some(child) = self.child(target) {
            child.find_into(partial, depth + 1, out);
        }
    }

    fn contains(&self, partial: &Word, depth: usize) -> bool {
        let target = partial.at(depth);
        if depth == partial.len() - 1 {
            if target.is_empty() {
                return !self.children.is_empty();
            }
            return self.child(target).is_some();
        }

        if target.is_empty() {
            self.children
                .iter()
                .any(|child| child.contains(partial, depth + 1))
        } else {
            self.child(target)
                .map_or(false, |child| child.contains(partial, depth + 1))
        }
    }
}

/// A prefix tree over the complete words of one length, answering wildcard
/// queries where empty atoms match anything.
pub struct WordTrie {
    root: TrieNode,
}

impl Default for WordTrie {
    fn default() -> WordTrie {
        WordTrie {
            root: TrieNode::new(Atom::EMPTY),
        }
    }
}

impl WordTrie {
    pub fn insert(&mut self, word: &Word) {
        let mut node = &mut self.root;
        for atom in word.iter() {
            let index = match node.children.iter().position(|child| child.value == atom) {
                Some(index) => index,
                None => {
                    node.children.push(TrieNode::new(atom));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        node.terminal = Some(word.clone());
    }

    /// Every complete word compatible with `partial`, in a deterministic
    /// order derived from insertion order.
    #[must_use]
    pub fn find(&self, partial: &Word) -> Vec<Word> {
        let mut out = vec![];
        if !partial.is_empty() {
            self.root.find_into(partial, 0, &mut out);
        }
        out
    }

    /// Like `find`, but short-circuits on the first match.
    #[must_use]
    pub fn contains(&self, partial: &Word) -> bool {
        !partial.is_empty() && self.root.contains(partial, 0)
    }
}

/// A bounded partial-word → has-solution memo. When full, an arbitrary
/// entry is evicted to make room.
struct PartialCache {
    map: HashMap<Word, bool>,
    max_entries: usize,
}

impl Default for PartialCache {
    fn default() -> PartialCache {
        PartialCache {
            map: HashMap::new(),
            max_entries: 10_000,
        }
    }
}

impl PartialCache {
    fn get(&self, partial: &Word) -> Option<bool> {
        self.map.get(partial).copied()
    }

    fn insert(&mut self, partial: Word, value: bool) {
        if self.map.len() >= self.max_entries {
            if let Some(victim) = self.map.keys().next().cloned() {
                self.map.remove(&victim);
            }
        }
        self.map.insert(partial, value);
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

/// One indexed word with its scores.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub word: Word,
    /// Normalized desirability, 1..=100 after loading finishes.
    pub freq_score: i32,
    /// Branching heuristic; not normalized.
    pub letter_score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NeverLoaded,
    Loading,
    Loaded,
}

/// The words of a single length.
struct LengthStore {
    length: usize,
    /// Sorted by descending letter score once loading finishes.
    entries: Vec<IndexEntry>,
    word_set: HashMap<Word, i32>,
    trie: WordTrie,
    partial_cache: Mutex<PartialCache>,
    state: LoadState,
}

impl LengthStore {
    fn new(length: usize) -> LengthStore {
        LengthStore {
            length,
            entries: vec![],
            word_set: HashMap::new(),
            trie: WordTrie::default(),
            partial_cache: Mutex::new(PartialCache::default()),
            state: LoadState::NeverLoaded,
        }
    }

    fn add_entry(&mut self, word: Word, freq_score: i32, letter_score: i32) {
        assert_eq!(word.len(), self.length);
        self.word_set.insert(word.clone(), freq_score);
        self.trie.insert(&word);
        self.entries.push(IndexEntry {
            word,
            freq_score,
            letter_score,
        });
    }

    /// Squash raw frequencies onto 1..=100 around their own mean: one
    /// standard deviation above the mean maps to 100, while the left tail
    /// is divided by two extra so mediocre words cluster near average.
    fn normalize_frequency_scores(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        let n = self.entries.len() as f64;
        let mean = self
            .entries
            .iter()
            .map(|e| f64::from(e.freq_score))
            .sum::<f64>()
            / n;
        let sd = (self
            .entries
            .iter()
            .map(|e| (f64::from(e.freq_score) - mean).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        let max_sigma = 1.0;
        let min_sigma = 2.0;

        for entry in &mut self.entries {
            let mut sigma = if sd > 0.0 {
                (f64::from(entry.freq_score) - mean) / sd
            } else {
                0.0
            };
            sigma /= if sigma > 0.0 { max_sigma } else { min_sigma };
            sigma = sigma.clamp(-1.0, 1.0);

            let new_score = (50.0 + 50.0 * sigma).clamp(1.0, 100.0);
            entry.freq_score = new_score as i32;
            self.word_set.insert(entry.word.clone(), entry.freq_score);
        }
    }

    fn has_solution(&self, partial: &Word, score_min: i32) -> bool {
        let mut cache = self
            .partial_cache
            .lock()
            .expect("partial cache lock poisoned");
        if let Some(hit) = cache.get(partial) {
            return hit;
        }
        // The memo key ignores score_min, so callers must flush between
        // search iterations that change the floor.
        let result = self
            .entries
            .iter()
            .any(|entry| entry.freq_score >= score_min && matches(partial, &entry.word));
        cache.insert(partial.clone(), result);
        result
    }

    fn flush_partial_cache(&self) {
        self.partial_cache
            .lock()
            .expect("partial cache lock poisoned")
            .clear();
    }
}

/// The full length-partitioned index. Reads only need `&self`; loading
/// takes the writer lock for its entire duration, and `wait_for_load`
/// blocks on that same lock.
pub struct WordIndex {
    stores: RwLock<Vec<LengthStore>>,
    loaded: AtomicBool,
}

impl Default for WordIndex {
    fn default() -> WordIndex {
        WordIndex::new()
    }
}

impl WordIndex {
    #[must_use]
    pub fn new() -> WordIndex {
        WordIndex {
            stores: RwLock::new((0..MAX_DIM).map(LengthStore::new).collect()),
            loaded: AtomicBool::new(false),
        }
    }

    /// True once a load has run to completion.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// The load state of the store for `length`.
    #[must_use]
    pub fn load_state(&self, length: usize) -> LoadState {
        self.stores.read().expect("word index lock poisoned")[length].state
    }

    /// Block until any in-flight load has released the writer lock.
    pub fn wait_for_load(&self) {
        drop(self.stores.read().expect("word index lock poisoned"));
    }

    /// Insert a single scored word. Complete words shorter than `MAX_DIM`
    /// only.
    pub fn add_entry(&self, word: Word, freq_score: i32, letter_score: i32) {
        assert!(word.is_complete(), "indexing a partial word");
        assert!(word.len() < MAX_DIM, "indexing an oversized word");
        let mut stores = self.stores.write().expect("word index lock poisoned");
        let length = word.len();
        stores[length].add_entry(word, freq_score, letter_score);
    }

    /// Membership test for a complete word.
    #[must_use]
    pub fn contains(&self, word: &Word) -> bool {
        if word.len() >= MAX_DIM {
            return false;
        }
        let stores = self.stores.read().expect("word index lock poisoned");
        stores[word.len()].word_set.contains_key(word)
    }

    /// The normalized frequency score of a word, if it is indexed.
    #[must_use]
    pub fn freq_score(&self, word: &Word) -> Option<i32> {
        if word.len() >= MAX_DIM {
            return None;
        }
        let stores = self.stores.read().expect("word index lock poisoned");
        stores[word.len()].word_set.get(word).copied()
    }

    /// Every complete word compatible with `partial`, in trie order. The
    /// `score_min` floor is deliberately not applied here; `has_solution`
    /// is the score-aware query, and callers that need ranked or filtered
    /// candidates postprocess this result.
    #[must_use]
    pub fn get_solutions(&self, partial: &Word, _score_min: i32) -> Vec<Word> {
        if partial.is_empty() || partial.len() >= MAX_DIM {
            return vec![];
        }
        let stores = self.stores.read().expect("word index lock poisoned");
        stores[partial.len()].trie.find(partial)
    }

    /// True iff some indexed word with `freq_score >= score_min` fits
    /// `partial`. Memoized per store; see `flush_caches`.
    #[must_use]
    pub fn has_solution(&self, partial: &Word, score_min: i32) -> bool {
        if partial.is_empty() || partial.len() >= MAX_DIM {
            return false;
        }
        let stores = self.stores.read().expect("word index lock poisoned");
        stores[partial.len()].has_solution(partial, score_min)
    }

    /// Drop every per-length has-solution memo.
    pub fn flush_caches(&self) {
        let stores = self.stores.read().expect("word index lock poisoned");
        for store in stores.iter() {
            store.flush_partial_cache();
        }
    }

    /// Parse and index the given dictionary text, then normalize scores and
    /// sort each store. Malformed lines are skipped with a warning.
    pub fn load_from_str(&self, contents: &str) {
        let mut stores = self.stores.write().expect("word index lock poisoned");
        for store in stores.iter_mut() {
            store.state = LoadState::Loading;
        }

        let mut loaded = 0usize;
        let mut skipped = 0usize;
        for raw_line in contents.lines() {
            let line: String = raw_line.trim().nfc().collect::<String>().to_uppercase();
            if line.is_empty() {
                continue;
            }
            match parse_dict_line(&line) {
                Ok((word, raw_score)) => {
                    if word.len() >= MAX_DIM {
                        continue;
                    }
                    let letter = letter_score(&word);
                    let length = word.len();
                    stores[length].add_entry(word, raw_score, letter);
                    loaded += 1;
                }
                Err(error) => {
                    skipped += 1;
                    if skipped <= 100 {
                        warn!("{error}");
                    }
                }
            }
        }

        for store in stores.iter_mut() {
            store.normalize_frequency_scores();
            store
                .entries
                .sort_by(|a, b| b.letter_score.cmp(&a.letter_score));
            store.flush_partial_cache();
            store.state = LoadState::Loaded;
        }
        drop(stores);

        self.loaded.store(true, Ordering::SeqCst);
        info!("loaded {loaded} dictionary entries ({skipped} lines skipped)");
    }

    /// Load a dictionary file. On failure the index keeps whatever state it
    /// had before the call.
    pub fn load_from_file(&self, path: &Path) -> Result<(), DictError> {
        let contents = fs::read_to_string(path)
            .map_err(|_| DictError::InvalidPath(path.display().to_string()))?;
        self.load_from_str(&contents);
        Ok(())
    }

    /// Load a dictionary file on a background thread. `wait_for_load`
    /// blocks until the load finishes.
    pub fn load_deferred(self: &Arc<Self>, path: PathBuf) {
        self.loaded.store(false, Ordering::SeqCst);
        let index = Arc::clone(self);
        thread::spawn(move || {
            debug!("deferred dictionary load from {}", path.display());
            if let Err(error) = index.load_from_file(&path) {
                warn!("deferred dictionary load failed: {error}");
            }
        });
    }
}

fn parse_dict_line(line: &str) -> Result<(Word, i32), DictError> {
    let captures = DICT_LINE
        .captures(line)
        .ok()
        .flatten()
        .ok_or_else(|| DictError::InvalidLine(line.to_string()))?;

    let word = Word::parse(&captures[1]).ok_or_else(|| DictError::InvalidLine(line.to_string()))?;
    let score: i32 = captures[2]
        .parse()
        .map_err(|_| DictError::InvalidScore(captures[2].to_string()))?;

    Ok((word, score))
}
