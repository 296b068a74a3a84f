//! Open-document state
//!
//! Text of documents the editor has open, kept as a rope so incremental
//! `didChange` edits apply by range. Documents are immutable values:
//! applying changes produces a new document that replaces the old one in
//! the backend's map, so readers never observe a half-applied edit.

use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};
use tracing::warn;

pub fn lsp_position_to_offset(position: &Position, text: &Rope) -> usize {
    let line = (position.line as usize).min(text.len_lines().saturating_sub(1));
    let char = position.character as usize;
    (text.line_to_char(line) + char).min(text.len_chars())
}

#[derive(Debug, Clone)]
pub struct LspDocument {
    pub id: u32,
    pub uri: Url,
    pub version: i32,
    pub text: Rope,
}

impl LspDocument {
    pub fn new(id: u32, uri: Url, text: &str, version: i32) -> Self {
        Self {
            id,
            uri,
            version,
            text: Rope::from_str(text),
        }
    }

    /// Applies content changes, returning the updated document. Changes
    /// older than the current version are ignored.
    pub fn apply(&self, changes: &[TextDocumentContentChangeEvent], version: i32) -> Self {
        if version <= self.version {
            warn!(
                "Ignoring stale change for {} (version {} <= {})",
                self.uri, version, self.version
            );
            return self.clone();
        }

        let mut text = self.text.clone();
        for change in changes {
            if let Some(range) = change.range {
                let start = lsp_position_to_offset(&range.start, &text);
                let end = lsp_position_to_offset(&range.end, &text);
                text.remove(start..end);
                text.insert(start, &change.text);
            } else {
                text = Rope::from_str(&change.text);
            }
        }

        Self {
            id: self.id,
            uri: self.uri.clone(),
            version,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Range;

    fn doc(text: &str) -> LspDocument {
        LspDocument::new(1, Url::parse("file:///test.pro").unwrap(), text, 0)
    }

    #[test]
    fn test_apply_full_change() {
        let d = doc("initial text");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "new text".to_string(),
        }];
        let updated = d.apply(&changes, 1);
        assert_eq!(updated.text.to_string(), "new text");
        assert_eq!(updated.version, 1);
    }

    #[test]
    fn test_apply_incremental_change() {
        let d = doc("hello world");
        let changes = vec![TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(0, 6),
                end: Position::new(0, 11),
            }),
            range_length: None,
            text: "there".to_string(),
        }];
        let updated = d.apply(&changes, 1);
        assert_eq!(updated.text.to_string(), "hello there");
    }

    #[test]
    fn test_apply_multiline_change() {
        let d = doc("pro one\nend\n");
        let changes = vec![TextDocumentContentChangeEvent {
            range: Some(Range {
                start: Position::new(1, 0),
                end: Position::new(1, 0),
            }),
            range_length: None,
            text: "x = 5\n".to_string(),
        }];
        let updated = d.apply(&changes, 1);
        assert_eq!(updated.text.to_string(), "pro one\nx = 5\nend\n");
    }

    #[test]
    fn test_stale_version_is_ignored() {
        let d = doc("initial");
        let changes = vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "changed".to_string(),
        }];
        let updated = d.apply(&changes, 1);
        let stale = updated.apply(&changes, 0);
        assert_eq!(stale.text.to_string(), "changed");
        assert_eq!(stale.version, 1);
    }
}
