//! Built-in routine dictionary
//!
//! The language ships a library of built-in functions, procedures,
//! methods and system-variable constants. Their metadata is embedded as
//! a static table keyed by index position, with parallel boolean tables
//! deciding call shape, and is loaded exactly once at startup. Each
//! entry is turned into a ready-made completion item: functions insert
//! an open paren, procedures a trailing comma, and task names become
//! factory-call snippets.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, MarkupContent, MarkupKind,
};

use crate::lsp::search::PreparedIndex;

/// Factory prefixes whose `…Task` entries insert as `PrefixTask('Name')`.
const TASK_FACTORY_PREFIXES: &[&str] = &["Pro"];

const DOCS_BASE_URL: &str = "https://docs.pro-lang.org/reference/";

#[derive(Debug, Deserialize)]
struct RoutineDoc {
    /// `null` stands for the unnameable null system variable.
    label: Option<String>,
    documentation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoutineData {
    docs: Vec<RoutineDoc>,
    functions: FxHashMap<String, bool>,
    procedures: FxHashMap<String, bool>,
    methods: FxHashMap<String, bool>,
    links: FxHashMap<String, String>,
}

pub struct RoutineDictionary {
    docs: Vec<CompletionItem>,
    functions: FxHashMap<String, usize>,
    procedures: FxHashMap<String, usize>,
    constants: FxHashMap<String, usize>,
    other: FxHashMap<String, usize>,
    index: RwLock<PreparedIndex>,
}

impl std::fmt::Debug for RoutineDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineDictionary")
            .field("routines", &self.docs.len())
            .finish()
    }
}

impl RoutineDictionary {
    /// Parses the embedded dictionary. Called once at startup.
    pub fn load() -> Self {
        let data: RoutineData = serde_json::from_str(include_str!("routines.json"))
            .expect("embedded routine dictionary is well-formed");

        let mut docs = Vec::with_capacity(data.docs.len());
        let mut functions = FxHashMap::default();
        let mut procedures = FxHashMap::default();
        let mut constants = FxHashMap::default();
        let mut other = FxHashMap::default();
        let mut index = PreparedIndex::new();

        for (idx, doc) in data.docs.into_iter().enumerate() {
            let label = doc.label.unwrap_or_else(|| "!null".to_string());
            let key = idx.to_string();
            let lower = label.to_lowercase();
            let is_method = data.methods.get(&key).copied().unwrap_or(false);

            let mut item = CompletionItem {
                label: label.clone(),
                documentation: doc
                    .documentation
                    .map(|text| render_documentation(text, data.links.get(&key))),
                ..Default::default()
            };

            if data.functions.get(&key).copied().unwrap_or(false) {
                item.insert_text = Some(format!("{}(", label));
                item.kind = Some(if is_method {
                    CompletionItemKind::METHOD
                } else {
                    CompletionItemKind::FUNCTION
                });
                functions.insert(lower.clone(), idx);
            } else if data.procedures.get(&key).copied().unwrap_or(false) {
                item.insert_text = Some(format!("{},", label));
                item.kind = Some(if is_method {
                    CompletionItemKind::METHOD
                } else {
                    CompletionItemKind::FUNCTION
                });
                procedures.insert(lower.clone(), idx);
            } else if label.starts_with('!') {
                item.kind = Some(CompletionItemKind::CONSTANT);
                constants.insert(lower.clone(), idx);
            } else {
                item.kind = Some(CompletionItemKind::TEXT);
                other.insert(lower.clone(), idx);
            }

            // task names insert as factory-call snippets
            for &prefix in TASK_FACTORY_PREFIXES {
                if label.starts_with(prefix)
                    && label.ends_with("Task")
                    && label.len() > prefix.len() + 4
                {
                    let name = &label[prefix.len()..label.len() - 4];
                    item.insert_text = Some(format!("{}Task('{}')", prefix, name));
                }
            }

            index.insert(&lower);
            docs.push(item);
        }

        Self {
            docs,
            functions,
            procedures,
            constants,
            other,
            index: RwLock::new(index),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Every built-in completion item, unranked.
    pub fn all(&self) -> Vec<CompletionItem> {
        self.docs.clone()
    }

    /// Built-in items matching the query via the prepared keys.
    pub fn search(&self, query: &str) -> Vec<CompletionItem> {
        let keys = self.index.write().search(query);
        keys.iter()
            .filter_map(|key| self.lookup(key))
            .map(|idx| self.docs[idx].clone())
            .collect()
    }

    /// Documentation for an exact built-in match, used for hover. The
    /// first search hit must match the query label exactly; near misses
    /// produce no hover rather than misleading text.
    pub fn hover(&self, search_name: &str) -> Option<Documentation> {
        if search_name.is_empty() {
            return None;
        }
        let hits = self.search(search_name);
        let first = hits.first()?;
        if first.label.eq_ignore_ascii_case(search_name) {
            first.documentation.clone()
        } else {
            None
        }
    }

    /// True when a built-in function of this lowercase name exists.
    pub fn is_function(&self, lower_name: &str) -> bool {
        self.functions.contains_key(lower_name)
    }

    /// True when a built-in procedure of this lowercase name exists.
    pub fn is_procedure(&self, lower_name: &str) -> bool {
        self.procedures.contains_key(lower_name)
    }

    fn lookup(&self, lower: &str) -> Option<usize> {
        self.functions
            .get(lower)
            .or_else(|| self.procedures.get(lower))
            .or_else(|| self.constants.get(lower))
            .or_else(|| self.other.get(lower))
            .copied()
    }
}

fn render_documentation(text: String, link: Option<&String>) -> Documentation {
    let value = match link {
        Some(link) => format!("{}\n\n[Reference]({}{})", text, DOCS_BASE_URL, link),
        None => text,
    };
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_loads() {
        let dict = RoutineDictionary::load();
        assert!(!dict.is_empty());
        assert!(dict.is_function("n_elements"));
        assert!(dict.is_procedure("print"));
        assert!(!dict.is_function("print"));
    }

    #[test]
    fn test_function_insert_text_opens_call() {
        let dict = RoutineDictionary::load();
        let hits = dict.search("n_elements");
        let item = hits.iter().find(|i| i.label == "n_elements").unwrap();
        assert_eq!(item.insert_text.as_deref(), Some("n_elements("));
        assert_eq!(item.kind, Some(CompletionItemKind::FUNCTION));
    }

    #[test]
    fn test_procedure_insert_text_trails_comma() {
        let dict = RoutineDictionary::load();
        let hits = dict.search("print");
        let item = hits.iter().find(|i| i.label == "print").unwrap();
        assert_eq!(item.insert_text.as_deref(), Some("print,"));
    }

    #[test]
    fn test_task_factory_snippet() {
        let dict = RoutineDictionary::load();
        let hits = dict.search("ProMosaicTask");
        let item = hits.iter().find(|i| i.label == "ProMosaicTask").unwrap();
        assert_eq!(item.insert_text.as_deref(), Some("ProTask('Mosaic')"));
    }

    #[test]
    fn test_null_label_becomes_named_constant() {
        let dict = RoutineDictionary::load();
        let hits = dict.search("!null");
        assert!(hits
            .iter()
            .any(|i| i.label == "!null" && i.kind == Some(CompletionItemKind::CONSTANT)));
    }

    #[test]
    fn test_method_entries_are_method_kind() {
        let dict = RoutineDictionary::load();
        let hits = dict.search("::keys");
        let item = hits.iter().find(|i| i.label == "hash::keys").unwrap();
        assert_eq!(item.kind, Some(CompletionItemKind::METHOD));
    }

    #[test]
    fn test_hover_requires_exact_label() {
        let dict = RoutineDictionary::load();
        assert!(dict.hover("histogram").is_some());
        assert!(dict.hover("histogr").is_none());
        assert!(dict.hover("").is_none());
    }
}
