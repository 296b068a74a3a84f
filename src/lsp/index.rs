//! Workspace symbol index
//!
//! An explicitly owned store mapping lowercased symbol names to every
//! `(uri, symbol)` occurrence across the workspace. Per-file extraction
//! is memoized in a plain map with no eviction — the index stays
//! authoritative for every file it has seen until that file is removed.
//! The store performs no locking of its own; the embedding layer
//! serializes mutations per document (an update must finish, including
//! diagnostic republish, before the next edit of the same file starts).

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::{CompletionItem, Location, Position, SymbolInformation, Url};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::completion::CompletionBuckets;
use super::cursor::{resolve_word, CursorWord};
use super::error::EngineError;
use super::extract::{RegexSymbolExtractor, SymbolExtractor};
use super::search::PreparedIndex;
use super::symbols::{completion_kind, ProSymbol};
use super::text_cache::{DocumentProvider, TextCache};

/// One definition occurrence stored under a name key.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub uri: Url,
    pub symbol: ProSymbol,
}

/// Everything extracted from one file, memoized per URI.
#[derive(Debug)]
struct FileRecord {
    symbols: Vec<ProSymbol>,
}

impl FileRecord {
    fn variables(&self) -> impl Iterator<Item = &ProSymbol> {
        self.symbols.iter().filter(|s| s.is_variable())
    }

    fn routines(&self) -> impl Iterator<Item = &ProSymbol> {
        self.symbols.iter().filter(|s| !s.is_variable())
    }
}

pub struct SymbolStore {
    extractor: Box<dyn SymbolExtractor + Send + Sync>,
    cache: TextCache,
    files: FxHashMap<Url, FileRecord>,
    /// Lowercased name -> occurrences, in insertion order. Entries are
    /// never silently deduplicated; duplicates are the problem
    /// detector's material.
    entries: FxHashMap<String, Vec<SymbolEntry>>,
    names: PreparedIndex,
    buckets: CompletionBuckets,
    /// File-local variable completions, first definition per name.
    constants: FxHashMap<Url, Vec<CompletionItem>>,
    /// Folder root -> files indexed from it, for workspace removal.
    folders: FxHashMap<PathBuf, Vec<Url>>,
}

impl std::fmt::Debug for SymbolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolStore")
            .field("files", &self.files.len())
            .field("names", &self.names.len())
            .finish()
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::with_extractor(Box::new(RegexSymbolExtractor::new()))
    }

    pub fn with_extractor(extractor: Box<dyn SymbolExtractor + Send + Sync>) -> Self {
        Self {
            extractor,
            cache: TextCache::new(),
            files: FxHashMap::default(),
            entries: FxHashMap::default(),
            names: PreparedIndex::new(),
            buckets: CompletionBuckets::new(),
            constants: FxHashMap::default(),
            folders: FxHashMap::default(),
        }
    }

    /// Extracts and registers a document's symbols, memoized: a URI
    /// already indexed returns its cached symbols untouched. Read
    /// failures propagate and leave the store unchanged.
    pub fn index_document(
        &mut self,
        uri: &Url,
        provider: &dyn DocumentProvider,
    ) -> Result<Vec<ProSymbol>, EngineError> {
        if let Some(record) = self.files.get(uri) {
            return Ok(record.symbols.clone());
        }

        let text = self.cache.clean_text(uri, provider)?;
        let symbols = self.extractor.extract(text);

        for symbol in symbols.iter().filter(|s| !s.is_variable()) {
            let key = symbol.key();
            let entry = SymbolEntry {
                uri: uri.clone(),
                symbol: symbol.clone(),
            };
            self.entries.entry(key.clone()).or_default().push(entry);
            self.names.insert(&key);
            self.buckets.register(symbol);
        }

        // variables stay file-scoped: completion constants only, never
        // merged into the cross-file map
        let mut seen = Vec::new();
        let constants: Vec<CompletionItem> = symbols
            .iter()
            .filter(|s| s.is_variable())
            .filter(|s| {
                let key = s.key();
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .map(|s| CompletionItem {
                label: s.name.clone(),
                kind: Some(completion_kind(s.kind)),
                detail: Some(s.detail.clone()),
                ..Default::default()
            })
            .collect();
        self.constants.insert(uri.clone(), constants);

        debug!("Indexed {}: {} symbols", uri, symbols.len());
        self.files.insert(
            uri.clone(),
            FileRecord {
                symbols: symbols.clone(),
            },
        );
        Ok(symbols)
    }

    /// Erases a document's contribution: its entries leave the name map
    /// and buckets, other files' entries under the same names survive.
    /// Removing a document that was never indexed is a no-op.
    pub fn remove_document(&mut self, uri: &Url) {
        let record = match self.files.remove(uri) {
            Some(record) => record,
            None => {
                self.cache.remove(uri);
                return;
            }
        };

        for symbol in record.routines() {
            let key = symbol.key();
            if let Some(list) = self.entries.get_mut(&key) {
                if let Some(idx) = list.iter().position(|e| &e.uri == uri) {
                    list.remove(idx);
                }
                if list.is_empty() {
                    self.entries.remove(&key);
                    self.names.remove(&key);
                }
            }
            self.buckets.unregister(symbol);
        }

        self.constants.remove(uri);
        self.cache.remove(uri);
        debug!("Removed {} from index", uri);
    }

    /// Full remove-then-reinsert — never a diff, so a stale partial
    /// entry cannot survive an edit.
    pub fn update_document(
        &mut self,
        uri: &Url,
        provider: &dyn DocumentProvider,
    ) -> Result<Vec<ProSymbol>, EngineError> {
        self.remove_document(uri);
        self.index_document(uri, provider)
    }

    /// Indexes every `*.pro` beneath the given root (explicit path, no
    /// working-directory games), skipping `*.spec.pro` fixtures.
    /// Per-file failures are logged and skipped; the batch continues.
    /// Returns the number of files indexed.
    pub fn index_workspace_folder(
        &mut self,
        root: &Path,
        provider: &dyn DocumentProvider,
    ) -> usize {
        let mut indexed = Vec::new();
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "pro") {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.to_lowercase().ends_with(".spec.pro") {
                continue;
            }
            let uri = match Url::from_file_path(path) {
                Ok(uri) => uri,
                Err(()) => continue,
            };
            match self.index_document(&uri, provider) {
                Ok(_) => indexed.push(uri),
                Err(e) => warn!("Failed to index {}: {}", uri, e),
            }
        }

        let count = indexed.len();
        self.folders
            .entry(root.to_path_buf())
            .or_default()
            .extend(indexed);
        debug!("Indexed workspace folder {:?}: {} files", root, count);
        count
    }

    /// Unindexes everything a folder contributed.
    pub fn remove_workspace_folder(&mut self, root: &Path) {
        if let Some(uris) = self.folders.remove(root) {
            for uri in uris {
                self.remove_document(&uri);
            }
        }
    }

    /// Name-key search returning every occurrence of every matching key,
    /// so duplicate-definition consumers see all candidates.
    pub fn find_by_name(&mut self, query: &str) -> Vec<SymbolInformation> {
        let keys = self.names.search(query);
        let mut results = Vec::new();
        for key in keys {
            if let Some(list) = self.entries.get(&key) {
                for entry in list {
                    results.push(entry.symbol.to_symbol_information(&entry.uri));
                }
            }
        }
        results
    }

    /// Document outline: the memoized symbols with variables filtered
    /// out and display names applied.
    pub fn outline(
        &mut self,
        uri: &Url,
        provider: &dyn DocumentProvider,
    ) -> Result<Vec<ProSymbol>, EngineError> {
        Ok(self
            .index_document(uri, provider)?
            .into_iter()
            .filter(|s| !s.is_variable())
            .collect())
    }

    /// Resolves the word at a cursor, consulting the variables defined
    /// above the cursor line (nearest first) for method qualification.
    pub fn resolve_at(
        &mut self,
        uri: &Url,
        position: Position,
        provider: &dyn DocumentProvider,
    ) -> Result<CursorWord, EngineError> {
        let line = self
            .cache
            .clean_lines(uri, provider)?
            .get(position.line as usize)
            .cloned()
            .unwrap_or_default();

        let mut preceding: Vec<&ProSymbol> = self
            .files
            .get(uri)
            .map(|record| {
                record
                    .variables()
                    .filter(|v| v.range.start.line < position.line)
                    .collect()
            })
            .unwrap_or_default();
        // nearest definition first, so shadowing assignments win
        preceding.sort_by(|a, b| b.range.start.line.cmp(&a.range.start.line));

        Ok(resolve_word(&line, position, &preceding))
    }

    /// Go-to-definition: resolve the cursor word, search, and unless
    /// `strict` is off, accept only an exact kind/name/parenthesization
    /// match on the best candidate.
    pub fn find_definition(
        &mut self,
        uri: &Url,
        position: Position,
        provider: &dyn DocumentProvider,
        strict: bool,
    ) -> Result<Option<Location>, EngineError> {
        let word = self.resolve_at(uri, position, provider)?;
        if word.is_empty() {
            return Ok(None);
        }
        let search_name = word.search_name.to_lowercase();

        let symbols = self.find_by_name(&search_name);
        let first = match symbols.first() {
            Some(first) => first,
            None => return Ok(None),
        };

        if !strict {
            return Ok(Some(first.location.clone()));
        }

        let candidate = first.name.to_lowercase();
        let matched = if search_name.contains("::") {
            // methods match on their qualified tail
            (word.is_function && candidate.ends_with(&format!("{}()", search_name)))
                || candidate.ends_with(&search_name)
        } else {
            (word.is_function && candidate == format!("{}()", search_name))
                || candidate == search_name
        };

        Ok(matched.then(|| first.location.clone()))
    }

    /// User-code completion items for a resolved cursor word: the bucket
    /// the ranking policy selects, plus this file's variable constants.
    pub fn completions(&mut self, word: &CursorWord, uri: &Url) -> Vec<CompletionItem> {
        let mut items = self.constants.get(uri).cloned().unwrap_or_default();
        items.extend(self.buckets.search(word));
        items
    }

    /// All name-key buckets, for the problem detector's sweep.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Vec<SymbolEntry>)> {
        self.entries.iter()
    }

    pub fn is_indexed(&self, uri: &Url) -> bool {
        self.files.contains_key(uri)
    }

    /// Number of distinct name keys.
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Number of entries under one lowercase name key.
    pub fn entry_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |list| list.len())
    }

    /// Distinct names across the completion buckets.
    pub fn bucket_len(&self) -> usize {
        self.buckets.len()
    }
}
