//! Duplicate and built-in conflict detection
//!
//! Walks the workspace name map and emits diagnostics for routines that
//! collide: two definitions of the same name with matching kind and
//! detail anywhere in the workspace, or a user routine shadowing a
//! built-in of the same call shape. Detection always recomputes from
//! scratch; publishing remembers the previous pass's URIs so a fixed
//! file gets one final empty publish to clear its stale markers.

use rustc_hash::{FxHashMap, FxHashSet};
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Range, SymbolKind, Url};

use super::completion::RoutineDictionary;
use super::index::SymbolStore;

pub const DUPLICATE_MESSAGE: &str = "Duplicate routine definition";
pub const BUILTIN_MESSAGE: &str = "Routine conflicts with a built-in routine";

const SOURCE: &str = "pro";

fn diagnostic(range: Range, severity: DiagnosticSeverity, message: &str) -> Diagnostic {
    Diagnostic {
        range,
        severity: Some(severity),
        message: message.to_string(),
        source: Some(SOURCE.to_string()),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct ProblemDetector {
    problems: FxHashMap<Url, Vec<Diagnostic>>,
    published: FxHashSet<Url>,
}

impl ProblemDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the problem map from the current index state.
    pub fn detect(&mut self, store: &SymbolStore, builtins: &RoutineDictionary) {
        self.problems.clear();

        for (key, entries) in store.entries() {
            // a routine shadowing a built-in of the same call shape
            let bare = key.trim_end_matches("()");
            for entry in entries {
                if entry.symbol.is_variable() || entry.symbol.kind == SymbolKind::METHOD {
                    continue;
                }
                let collides = if entry.symbol.detail.contains("Function") {
                    builtins.is_function(bare)
                } else {
                    builtins.is_procedure(bare)
                };
                if collides {
                    self.problems
                        .entry(entry.uri.clone())
                        .or_default()
                        .push(diagnostic(
                            entry.symbol.range,
                            DiagnosticSeverity::WARNING,
                            BUILTIN_MESSAGE,
                        ));
                }
            }

            // pairwise duplicate scan within the bucket; buckets are
            // small so the quadratic comparison stays cheap
            if entries.len() > 1 {
                for i in 0..entries.len() {
                    for j in (i + 1)..entries.len() {
                        let (a, b) = (&entries[i], &entries[j]);
                        if a.symbol.is_variable() || b.symbol.is_variable() {
                            continue;
                        }
                        if a.symbol.kind == b.symbol.kind && a.symbol.detail == b.symbol.detail {
                            self.problems.entry(a.uri.clone()).or_default().push(
                                diagnostic(a.symbol.range, DiagnosticSeverity::ERROR, DUPLICATE_MESSAGE),
                            );
                            self.problems.entry(b.uri.clone()).or_default().push(
                                diagnostic(b.symbol.range, DiagnosticSeverity::ERROR, DUPLICATE_MESSAGE),
                            );
                        }
                    }
                }
            }
        }
    }

    /// The per-URI lists to publish now: every URI with problems, plus
    /// an empty list for each URI published last time that has none
    /// anymore. Consumes the memory of the previous publish.
    pub fn take_publishes(&mut self) -> Vec<(Url, Vec<Diagnostic>)> {
        let mut out: Vec<(Url, Vec<Diagnostic>)> = self
            .problems
            .iter()
            .map(|(uri, diags)| (uri.clone(), diags.clone()))
            .collect();

        for uri in self.published.drain() {
            if !self.problems.contains_key(&uri) {
                out.push((uri, Vec::new()));
            }
        }
        self.published = self.problems.keys().cloned().collect();
        out
    }

    /// Current diagnostics for one URI.
    pub fn for_uri(&self, uri: &Url) -> &[Diagnostic] {
        self.problems.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn problem_count(&self) -> usize {
        self.problems.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::text_cache::DocumentProvider;
    use rustc_hash::FxHashMap as Map;

    #[derive(Default)]
    struct MemDocs(Map<Url, String>);

    impl MemDocs {
        fn with(mut self, uri: &Url, text: &str) -> Self {
            self.0.insert(uri.clone(), text.to_string());
            self
        }
    }

    impl DocumentProvider for MemDocs {
        fn open_text(&self, uri: &Url) -> Option<String> {
            self.0.get(uri).cloned()
        }
    }

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///workspace/{}", name)).unwrap()
    }

    #[test]
    fn test_duplicate_definitions_flag_both_files() {
        let a = uri("a.pro");
        let b = uri("b.pro");
        let docs = MemDocs::default()
            .with(&a, "pro addition, x, y\nend\n")
            .with(&b, "pro addition, x, y\nend\n");
        let mut store = SymbolStore::new();
        store.index_document(&a, &docs).unwrap();
        store.index_document(&b, &docs).unwrap();

        let builtins = RoutineDictionary::load();
        let mut detector = ProblemDetector::new();
        detector.detect(&store, &builtins);

        assert_eq!(detector.problem_count(), 2);
        assert_eq!(detector.for_uri(&a).len(), 1);
        assert_eq!(detector.for_uri(&b).len(), 1);
        assert_eq!(detector.for_uri(&a)[0].message, DUPLICATE_MESSAGE);
        assert_eq!(
            detector.for_uri(&a)[0].severity,
            Some(DiagnosticSeverity::ERROR)
        );
    }

    #[test]
    fn test_function_and_procedure_of_same_name_do_not_conflict() {
        let a = uri("a.pro");
        let b = uri("b.pro");
        let docs = MemDocs::default()
            .with(&a, "pro work\nend\n")
            .with(&b, "function work\nend\n");
        let mut store = SymbolStore::new();
        store.index_document(&a, &docs).unwrap();
        store.index_document(&b, &docs).unwrap();

        let builtins = RoutineDictionary::load();
        let mut detector = ProblemDetector::new();
        detector.detect(&store, &builtins);
        assert_eq!(detector.problem_count(), 0);
    }

    #[test]
    fn test_builtin_conflict_is_warning() {
        let a = uri("a.pro");
        let docs = MemDocs::default().with(&a, "pro print, thing\nend\n");
        let mut store = SymbolStore::new();
        store.index_document(&a, &docs).unwrap();

        let builtins = RoutineDictionary::load();
        let mut detector = ProblemDetector::new();
        detector.detect(&store, &builtins);

        let diags = detector.for_uri(&a);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, BUILTIN_MESSAGE);
        assert_eq!(diags[0].severity, Some(DiagnosticSeverity::WARNING));
    }

    #[test]
    fn test_builtin_conflict_respects_shape() {
        // a user *function* named like a built-in *procedure* is fine
        let a = uri("a.pro");
        let docs = MemDocs::default().with(&a, "function print\nend\n");
        let mut store = SymbolStore::new();
        store.index_document(&a, &docs).unwrap();

        let builtins = RoutineDictionary::load();
        let mut detector = ProblemDetector::new();
        detector.detect(&store, &builtins);
        assert_eq!(detector.problem_count(), 0);
    }

    #[test]
    fn test_publish_clears_fixed_uris() {
        let a = uri("a.pro");
        let b = uri("b.pro");
        let docs = MemDocs::default()
            .with(&a, "pro addition\nend\n")
            .with(&b, "pro addition\nend\n");
        let mut store = SymbolStore::new();
        store.index_document(&a, &docs).unwrap();
        store.index_document(&b, &docs).unwrap();

        let builtins = RoutineDictionary::load();
        let mut detector = ProblemDetector::new();
        detector.detect(&store, &builtins);
        let first = detector.take_publishes();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|(_, diags)| !diags.is_empty()));

        // removing one file fixes the duplicate; both URIs get cleared
        store.remove_document(&b);
        detector.detect(&store, &builtins);
        let second = detector.take_publishes();
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|(_, diags)| diags.is_empty()));

        // nothing left to clear on the third pass
        detector.detect(&store, &builtins);
        assert!(detector.take_publishes().is_empty());
    }
}
