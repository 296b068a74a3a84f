//! Prepared fuzzy/substring search over symbol name keys
//!
//! Each searchable set of names (the global index and every completion
//! bucket) keeps its keys in two prepared forms: a `DynamicDawg` for
//! bounded-Levenshtein typo matching, and a suffix table over the
//! `\0`-joined keys for substring search, so query cost depends on the
//! query and match count rather than on candidate-string length. The
//! suffix table is invalidated on mutation and rebuilt lazily on the
//! next query.

use liblevenshtein::prelude::{Algorithm, DynamicDawg, Transducer};
use rustc_hash::FxHashSet;
use suffix::SuffixTable;

/// Default edit distance for typo-tolerant queries.
pub const FUZZY_DISTANCE: usize = 2;

struct SuffixCache {
    table: SuffixTable<'static, 'static>,
    /// Maps byte positions in the concatenated text back to term
    /// indices; `usize::MAX` marks a separator byte.
    position_to_term: Vec<usize>,
}

pub struct PreparedIndex {
    /// Unique keys in insertion order.
    terms: Vec<String>,
    dawg: DynamicDawg<()>,
    suffix: Option<SuffixCache>,
}

impl std::fmt::Debug for PreparedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedIndex")
            .field("terms", &self.terms.len())
            .finish()
    }
}

impl Default for PreparedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PreparedIndex {
    pub fn new() -> Self {
        Self {
            terms: Vec::new(),
            dawg: DynamicDawg::new(),
            suffix: None,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    /// Registers a key. Idempotent; keys are stored once.
    pub fn insert(&mut self, term: &str) {
        if !self.contains(term) {
            self.dawg.insert(term);
            self.terms.push(term.to_string());
            self.suffix = None;
        }
    }

    /// Unregisters a key.
    pub fn remove(&mut self, term: &str) {
        if let Some(idx) = self.terms.iter().position(|t| t == term) {
            self.terms.remove(idx);
            self.dawg.remove(term);
            self.suffix = None;
        }
    }

    /// All keys in insertion order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Keys matching the query: substring matches (prefixes first,
    /// shorter keys first) followed by bounded-Levenshtein typo matches.
    /// An empty query returns every key.
    pub fn search(&mut self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return self.terms.clone();
        }
        let query = query.to_lowercase();

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut results: Vec<String> = Vec::new();

        let mut substring: Vec<&String> = self
            .substring_term_indices(&query)
            .into_iter()
            .map(|idx| &self.terms[idx])
            .collect();
        substring.sort_by_key(|term| (!term.starts_with(&query), term.len()));
        for term in substring {
            if seen.insert(term.clone()) {
                results.push(term.clone());
            }
        }

        let transducer = Transducer::new(self.dawg.clone(), Algorithm::Standard);
        let mut fuzzy: Vec<(usize, String)> = transducer
            .query_with_distance(&query, FUZZY_DISTANCE)
            .map(|candidate| (candidate.distance, candidate.term))
            .collect();
        fuzzy.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        for (_, term) in fuzzy {
            if seen.insert(term.clone()) {
                results.push(term);
            }
        }

        results
    }

    fn substring_term_indices(&mut self, query: &str) -> Vec<usize> {
        if self.terms.is_empty() {
            return Vec::new();
        }
        let cache = self.suffix.get_or_insert_with(|| build_suffix(&self.terms));

        let mut indices: Vec<usize> = cache
            .table
            .positions(query)
            .iter()
            .filter_map(|&pos| cache.position_to_term.get(pos as usize).copied())
            .filter(|&idx| idx != usize::MAX)
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

fn build_suffix(terms: &[String]) -> SuffixCache {
    let mut text = String::new();
    let mut position_to_term = Vec::new();
    for (idx, term) in terms.iter().enumerate() {
        text.push_str(term);
        position_to_term.extend(std::iter::repeat(idx).take(term.len()));
        text.push('\0');
        position_to_term.push(usize::MAX);
    }
    SuffixCache {
        table: SuffixTable::new(text),
        position_to_term,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(terms: &[&str]) -> PreparedIndex {
        let mut index = PreparedIndex::new();
        for term in terms {
            index.insert(term);
        }
        index
    }

    #[test]
    fn test_substring_search() {
        let mut index = index_of(&["addition()", "subtraction()", "dataset::add()"]);
        let results = index.search("add");
        assert!(results.contains(&"addition()".to_string()));
        assert!(results.contains(&"dataset::add()".to_string()));
        assert!(!results.contains(&"subtraction()".to_string()));
        // prefix match ranks first
        assert_eq!(results[0], "addition()");
    }

    #[test]
    fn test_method_suffix_query() {
        let mut index = index_of(&["dataset::count()", "dataset::init", "report"]);
        let results = index.search("::count");
        assert_eq!(results, vec!["dataset::count()".to_string()]);
    }

    #[test]
    fn test_fuzzy_matches_typos() {
        let mut index = index_of(&["histogram"]);
        let results = index.search("histogrm");
        assert_eq!(results, vec!["histogram".to_string()]);
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let mut index = index_of(&["alpha", "beta"]);
        assert_eq!(index.search("").len(), 2);
    }

    #[test]
    fn test_remove_invalidates_results() {
        let mut index = index_of(&["alpha", "alphabet"]);
        assert_eq!(index.search("alpha").len(), 2);
        index.remove("alphabet");
        assert_eq!(index.search("alpha"), vec!["alpha".to_string()]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut index = PreparedIndex::new();
        index.insert("plot");
        index.insert("plot");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_index_search() {
        let mut index = PreparedIndex::new();
        assert!(index.search("anything").is_empty());
    }
}
