//! Per-file cleaned text cache
//!
//! Stores, per URI, the raw document text alongside a comment-stripped
//! rendition used by the regex scans. Stripping preserves line/column
//! alignment: every line keeps its index and its leading content, only
//! trailing comments and trailing whitespace are removed. Blank lines
//! survive in both the line array and the joined string so that counting
//! newlines up to a match offset yields original file positions.

use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::Url;

use super::error::EngineError;

/// Source of document text. Open editor buffers take precedence over the
/// file on disk.
pub trait DocumentProvider {
    /// Returns the text of an open document, or `None` when the URI is
    /// not open and should be read from disk.
    fn open_text(&self, uri: &Url) -> Option<String>;
}

/// Provider with no open documents; everything comes from disk.
pub struct DiskOnly;

impl DocumentProvider for DiskOnly {
    fn open_text(&self, _uri: &Url) -> Option<String> {
        None
    }
}

/// Truncates a line at the first `;` that sits outside single or double
/// quotes. An unterminated quote swallows the rest of the line.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return &line[..i],
            q @ (b'\'' | b'"') => match bytes[i + 1..].iter().position(|&b| b == q) {
                Some(off) => i += off + 2,
                None => return line,
            },
            _ => i += 1,
        }
    }
    line
}

#[derive(Debug, Default)]
pub struct TextCache {
    clean: FxHashMap<Url, String>,
    clean_lines: FxHashMap<Url, Vec<String>>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Comment-free text of the document as a single string, fetched and
    /// cleaned on first access. Read failures propagate and leave no
    /// partial cache entry behind.
    pub fn clean_text(
        &mut self,
        uri: &Url,
        provider: &dyn DocumentProvider,
    ) -> Result<&str, EngineError> {
        self.populate(uri, provider)?;
        Ok(self.clean.get(uri).expect("populated above"))
    }

    /// Comment-free text as one entry per original line.
    pub fn clean_lines(
        &mut self,
        uri: &Url,
        provider: &dyn DocumentProvider,
    ) -> Result<&[String], EngineError> {
        self.populate(uri, provider)?;
        Ok(self.clean_lines.get(uri).expect("populated above"))
    }

    /// Drops every cached form of the document.
    pub fn remove(&mut self, uri: &Url) {
        self.clean.remove(uri);
        self.clean_lines.remove(uri);
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.clean.contains_key(uri)
    }

    fn populate(&mut self, uri: &Url, provider: &dyn DocumentProvider) -> Result<(), EngineError> {
        if self.clean.contains_key(uri) {
            return Ok(());
        }

        let raw = match provider.open_text(uri) {
            Some(text) => text,
            None => {
                let path = uri
                    .to_file_path()
                    .map_err(|_| EngineError::InvalidUri(uri.clone()))?;
                std::fs::read_to_string(&path).map_err(|source| EngineError::Io { path, source })?
            }
        };

        let lines: Vec<String> = raw
            .split('\n')
            .map(|line| strip_comment(line.trim_end()).trim_end().to_string())
            .collect();
        self.clean.insert(uri.clone(), lines.join("\n"));
        self.clean_lines.insert(uri.clone(), lines);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    struct Fixed(String);

    impl DocumentProvider for Fixed {
        fn open_text(&self, _uri: &Url) -> Option<String> {
            Some(self.0.clone())
        }
    }

    fn test_uri() -> Url {
        Url::parse("file:///workspace/test.pro").unwrap()
    }

    #[test]
    fn test_strip_trailing_comment() {
        assert_eq!(strip_comment("a = 5 ; five"), "a = 5 ");
        assert_eq!(strip_comment("; full line comment"), "");
        assert_eq!(strip_comment("a = 5"), "a = 5");
    }

    #[test]
    fn test_semicolon_inside_quotes_is_kept() {
        assert_eq!(strip_comment("a = 'x;y' ; tail"), "a = 'x;y' ");
        assert_eq!(strip_comment("b = \"p;q\""), "b = \"p;q\"");
        // unterminated quote swallows the rest of the line
        assert_eq!(
            strip_comment("c = 'open ; not a comment"),
            "c = 'open ; not a comment"
        );
    }

    #[test]
    fn test_lines_stay_aligned() {
        let text = indoc! {"
            pro addition, a, b ; adds
            ; nothing here

            result = a + b
            end
        "};
        let mut cache = TextCache::new();
        let uri = test_uri();
        let provider = Fixed(text.to_string());
        let lines = cache.clean_lines(&uri, &provider).unwrap();
        assert_eq!(lines[0], "pro addition, a, b");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "result = a + b");

        // joined form counts the same newlines as the original
        let clean = cache.clean_text(&uri, &provider).unwrap();
        let line_of_result = clean[..clean.find("result").unwrap()]
            .matches('\n')
            .count();
        assert_eq!(line_of_result, 3);
    }

    #[test]
    fn test_remove_forgets_document() {
        let mut cache = TextCache::new();
        let uri = test_uri();
        cache.clean_text(&uri, &Fixed("a = 1".to_string())).unwrap();
        assert!(cache.contains(&uri));
        cache.remove(&uri);
        assert!(!cache.contains(&uri));
    }

    #[test]
    fn test_read_failure_leaves_no_entry() {
        let mut cache = TextCache::new();
        let uri = Url::parse("file:///does/not/exist.pro").unwrap();
        assert!(cache.clean_text(&uri, &DiskOnly).is_err());
        assert!(!cache.contains(&uri));
    }
}
