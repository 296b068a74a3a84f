//! Symbol model for `.pro` routine files
//!
//! A symbol is one lexical definition found in a file: a procedure, a
//! function, a method on a class, a class definition, or a variable
//! assignment. Kinds and detail strings are derived from the matched name
//! alone; the detail string doubles as the secondary key when comparing
//! two same-named symbols for duplicate detection.

use tower_lsp::lsp_types::{
    CompletionItemKind, DocumentSymbol, Location, Range, SymbolInformation, SymbolKind, Url,
};

/// Reserved suffix that turns a procedure into a class definition.
pub const CLASS_DEFINE_SUFFIX: &str = "__define";

/// One extracted definition, positioned within its owning document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProSymbol {
    /// Raw matched identifier text. Functions carry a trailing `()` for
    /// display and key purposes; methods contain `::`.
    pub name: String,
    /// Name as rendered in an outline. May differ from `name` when a
    /// single-class file has its class prefix stripped.
    pub display_name: String,
    pub kind: SymbolKind,
    /// "Function", "Procedure", "Variable", optionally suffixed with
    /// " method" or " (class definition)".
    pub detail: String,
    pub range: Range,
    pub selection_range: Range,
    /// Variables only: trimmed right-hand side of the assignment,
    /// normalized to `Class()` when the RHS constructs an object.
    pub next: Option<String>,
}

impl ProSymbol {
    /// Lookup key into the workspace index.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn is_variable(&self) -> bool {
        self.kind == SymbolKind::VARIABLE
    }

    #[allow(deprecated)]
    pub fn to_document_symbol(&self) -> DocumentSymbol {
        DocumentSymbol {
            name: self.display_name.clone(),
            detail: Some(self.detail.clone()),
            kind: self.kind,
            tags: None,
            deprecated: None,
            range: self.range,
            selection_range: self.selection_range,
            children: None,
        }
    }

    #[allow(deprecated)]
    pub fn to_symbol_information(&self, uri: &Url) -> SymbolInformation {
        SymbolInformation {
            name: self.name.clone(),
            kind: self.kind,
            tags: None,
            deprecated: None,
            location: Location {
                uri: uri.clone(),
                range: self.range,
            },
            container_name: None,
        }
    }
}

/// Detail suffix distinguishing methods and class definitions from plain
/// routines.
pub fn routine_detail_suffix(name: &str) -> &'static str {
    if name.contains("::") {
        " method"
    } else if name.to_lowercase().ends_with(CLASS_DEFINE_SUFFIX) {
        " (class definition)"
    } else {
        ""
    }
}

/// Symbol kind for a matched routine name.
pub fn routine_kind(name: &str) -> SymbolKind {
    if name.contains("::") {
        SymbolKind::METHOD
    } else if name.to_lowercase().ends_with(CLASS_DEFINE_SUFFIX) {
        SymbolKind::CLASS
    } else {
        SymbolKind::FUNCTION
    }
}

/// Completion item kind matching a symbol kind.
pub fn completion_kind(kind: SymbolKind) -> CompletionItemKind {
    match kind {
        SymbolKind::METHOD => CompletionItemKind::METHOD,
        SymbolKind::CLASS => CompletionItemKind::CLASS,
        SymbolKind::FUNCTION => CompletionItemKind::FUNCTION,
        SymbolKind::VARIABLE => CompletionItemKind::VARIABLE,
        _ => CompletionItemKind::TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_kind_resolution() {
        assert_eq!(routine_kind("addition"), SymbolKind::FUNCTION);
        assert_eq!(routine_kind("myclass::getproperty"), SymbolKind::METHOD);
        assert_eq!(routine_kind("myclass__define"), SymbolKind::CLASS);
        assert_eq!(routine_kind("MyClass__DEFINE"), SymbolKind::CLASS);
    }

    #[test]
    fn test_detail_suffix() {
        assert_eq!(routine_detail_suffix("addition"), "");
        assert_eq!(routine_detail_suffix("myclass::init"), " method");
        assert_eq!(
            routine_detail_suffix("myclass__define"),
            " (class definition)"
        );
    }
}
