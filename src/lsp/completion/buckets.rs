//! Completion buckets
//!
//! Derived, index-owned subsets of the workspace symbols, grouped by the
//! shape completion cares about: functions, procedures, and methods of
//! each. Buckets are maintained incrementally alongside the main index —
//! a register on insert, an unregister on removal — and are never
//! rebuilt from scratch for a query. Each bucket pairs ready-to-return
//! completion items with prepared search keys; the same name defined in
//! several files occupies one slot with a reference count.

use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::CompletionItem;

use crate::lsp::cursor::CursorWord;
use crate::lsp::search::PreparedIndex;
use crate::lsp::symbols::{completion_kind, ProSymbol};

#[derive(Debug, Default)]
struct Bucket {
    index: PreparedIndex,
    items: FxHashMap<String, (CompletionItem, usize)>,
}

impl Bucket {
    fn insert(&mut self, key: &str, item: CompletionItem) {
        match self.items.get_mut(key) {
            Some(slot) => slot.1 += 1,
            None => {
                self.index.insert(key);
                self.items.insert(key.to_string(), (item, 1));
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(slot) = self.items.get_mut(key) {
            slot.1 -= 1;
            if slot.1 == 0 {
                self.items.remove(key);
                self.index.remove(key);
            }
        }
    }

    fn search(&mut self, query: &str) -> Vec<CompletionItem> {
        if query.is_empty() {
            return self.all();
        }
        self.index
            .search(query)
            .iter()
            .filter_map(|key| self.items.get(key))
            .map(|(item, _)| item.clone())
            .collect()
    }

    fn all(&self) -> Vec<CompletionItem> {
        // insertion order, so results are stable across queries
        self.index
            .terms()
            .iter()
            .filter_map(|key| self.items.get(key))
            .map(|(item, _)| item.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
pub struct CompletionBuckets {
    functions: Bucket,
    procedures: Bucket,
    function_methods: Bucket,
    procedure_methods: Bucket,
}

/// Builds the text a completion inserts: functions reopen the call with
/// a bare paren, procedures trail a comma, and methods insert only the
/// member part after the accessor.
fn insert_text(symbol: &ProSymbol, is_method: bool) -> String {
    let part = if is_method {
        symbol.name.rsplit("::").next().unwrap_or(&symbol.name)
    } else {
        symbol.name.as_str()
    };
    if symbol.detail.contains("Function") {
        part.strip_suffix(')').unwrap_or(part).to_string()
    } else {
        format!("{},", part)
    }
}

impl CompletionBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a routine symbol to the bucket its shape selects.
    /// Variables never come through here.
    pub fn register(&mut self, symbol: &ProSymbol) {
        let is_method = symbol.name.contains("::");
        let bucket = match (symbol.detail.contains("Function"), is_method) {
            (true, true) => &mut self.function_methods,
            (true, false) => &mut self.functions,
            (false, true) => &mut self.procedure_methods,
            (false, false) => &mut self.procedures,
        };

        let item = CompletionItem {
            label: symbol.name.clone(),
            kind: Some(completion_kind(symbol.kind)),
            detail: Some(symbol.detail.clone()),
            insert_text: Some(insert_text(symbol, is_method)),
            ..Default::default()
        };
        bucket.insert(&symbol.key(), item);
    }

    /// Drops one occurrence of a routine symbol; the bucket slot
    /// survives while other files still define the same name.
    pub fn unregister(&mut self, symbol: &ProSymbol) {
        let is_method = symbol.name.contains("::");
        let bucket = match (symbol.detail.contains("Function"), is_method) {
            (true, true) => &mut self.function_methods,
            (true, false) => &mut self.functions,
            (false, true) => &mut self.procedure_methods,
            (false, false) => &mut self.procedures,
        };
        bucket.remove(&symbol.key());
    }

    /// Bucket routing for a resolved cursor word, first match wins:
    /// function methods, functions, everything (nothing typed),
    /// procedure methods, procedures.
    pub fn search(&mut self, word: &CursorWord) -> Vec<CompletionItem> {
        if word.is_method && (word.equal_before || word.is_function) {
            self.function_methods.search(&word.search_name)
        } else if !word.is_method && (word.equal_before || word.is_function) {
            self.functions.search(&word.search_name)
        } else if word.name.is_empty() {
            self.all_routines()
        } else if word.is_method {
            self.procedure_methods.search(&word.search_name)
        } else {
            self.procedures.search(&word.search_name)
        }
    }

    /// Every user routine across all buckets, unranked.
    pub fn all_routines(&self) -> Vec<CompletionItem> {
        let mut items = self.functions.all();
        items.extend(self.procedures.all());
        items.extend(self.function_methods.all());
        items.extend(self.procedure_methods.all());
        items
    }

    /// Total distinct names across all buckets.
    pub fn len(&self) -> usize {
        self.functions.len()
            + self.procedures.len()
            + self.function_methods.len()
            + self.procedure_methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
