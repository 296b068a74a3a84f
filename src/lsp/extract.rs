//! Lexical symbol extraction
//!
//! A regex-driven scan over comment-stripped text. This is deliberately a
//! heuristic layer, not a parser: it never executes code and accepts
//! false positives/negatives on pathological syntax. The extractor sits
//! behind a trait so a real tokenizer could replace it without touching
//! the index or completion layers.
//!
//! Pass ordering is load-bearing: procedures run before functions so
//! that class names discovered via `__define` procedures are available
//! when function display names are simplified.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{Position, Range, SymbolKind};

use super::symbols::{routine_detail_suffix, routine_kind, ProSymbol, CLASS_DEFINE_SUFFIX};

/// Produces symbols from cleaned text.
pub trait SymbolExtractor {
    fn extract(&self, text: &str) -> Vec<ProSymbol>;
}

static PRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^[ \t]*pro[ \t]+([a-z_][a-z_$0-9:]*)").unwrap());

static FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^[ \t]*function[ \t]+([a-z_][a-z_$0-9:]*)").unwrap());

/// Assignment anchored to a statement start: beginning of line, or right
/// after `then`, `else`, or a label colon.
static ASSIGNMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^[ \t]*|then[ \t]+|else[ \t]+|:[ \t]*)([a-z_][a-z_$0-9]*)[ \t]*=[ \t]*")
        .unwrap()
});

/// Object-constructor call on the right-hand side of an assignment.
static OBJ_NEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)obj_new\([ \t]*['"]([a-z_][a-z_0-9]*)"#).unwrap());

/// Line/column of a byte offset, counting newlines up to the offset.
fn position_at(text: &str, offset: usize) -> Position {
    let prefix = &text[..offset];
    let line = prefix.matches('\n').count();
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let character = text[line_start..offset].chars().count();
    Position::new(line as u32, character as u32)
}

fn range_of(text: &str, start: usize, matched: &str) -> Range {
    let begin = position_at(text, start);
    let end = Position::new(begin.line, begin.character + matched.chars().count() as u32);
    Range::new(begin, end)
}

/// Records a `__define` class base name the first time it is seen.
fn note_class(objects: &mut Vec<String>, matched_lower: &str) {
    if let Some(base) = matched_lower.strip_suffix(CLASS_DEFINE_SUFFIX) {
        if !objects.iter().any(|o| o == base) {
            objects.push(base.to_string());
        }
    }
}

/// Single-class outline cleanup: with exactly one class in the file,
/// strip the redundant class prefix from method and class display names.
/// Ambiguous multi-class files are left alone.
fn simplify_class_display(symbols: &mut [ProSymbol], objects: &[String]) {
    if objects.len() != 1 {
        return;
    }
    for symbol in symbols.iter_mut() {
        let low = symbol.display_name.to_lowercase();
        if low.contains(&objects[0]) && low.contains(':') {
            if let Some(idx) = symbol.display_name.find(':') {
                symbol.display_name = symbol.display_name[idx..].to_string();
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RegexSymbolExtractor;

impl RegexSymbolExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_procedures(&self, text: &str, objects: &mut Vec<String>) -> Vec<ProSymbol> {
        let mut symbols = Vec::new();
        for caps in PRO_RE.captures_iter(text) {
            let m = caps.get(1).expect("group 1 always present");
            let name = m.as_str();
            note_class(objects, &name.to_lowercase());

            let range = range_of(text, m.start(), name);
            symbols.push(ProSymbol {
                name: name.to_string(),
                display_name: name.to_string(),
                kind: routine_kind(name),
                detail: format!("Procedure{}", routine_detail_suffix(name)),
                range,
                selection_range: range,
                next: None,
            });
        }
        simplify_class_display(&mut symbols, objects);
        symbols
    }

    fn extract_functions(&self, text: &str, objects: &mut Vec<String>) -> Vec<ProSymbol> {
        let mut symbols = Vec::new();
        for caps in FUNCTION_RE.captures_iter(text) {
            let m = caps.get(1).expect("group 1 always present");
            let name = m.as_str();
            note_class(objects, &name.to_lowercase());

            let range = range_of(text, m.start(), name);
            symbols.push(ProSymbol {
                name: format!("{}()", name),
                display_name: format!("{}()", name),
                kind: routine_kind(name),
                detail: format!("Function{}", routine_detail_suffix(name)),
                range,
                selection_range: range,
                next: None,
            });
        }
        simplify_class_display(&mut symbols, objects);
        symbols
    }

    fn extract_variables(&self, text: &str) -> Vec<ProSymbol> {
        let mut symbols = Vec::new();
        let lines: Vec<&str> = text.split('\n').collect();
        let mut offset = 0usize;

        for (line_no, line) in lines.iter().enumerate() {
            // a `$` ends the previous statement's line; anything on this
            // line continues it and is not a fresh assignment
            let continued = line_no > 0 && lines[line_no - 1].trim_end().ends_with('$');
            if !continued {
                for caps in ASSIGNMENT_RE.captures_iter(line) {
                    let m = caps.get(2).expect("group 2 always present");
                    let name = m.as_str();

                    let rest = line[m.end()..]
                        .trim_start()
                        .trim_start_matches('=')
                        .trim()
                        .to_string();
                    let next = match OBJ_NEW_RE.captures(&rest) {
                        Some(obj) => format!("{}()", &obj[1]),
                        None => rest,
                    };

                    let range = range_of(text, offset + m.start(), name);
                    symbols.push(ProSymbol {
                        name: name.to_string(),
                        display_name: name.to_string(),
                        kind: SymbolKind::VARIABLE,
                        detail: "Variable".to_string(),
                        range,
                        selection_range: range,
                        next: Some(next),
                    });
                }
            }
            offset += line.len() + 1;
        }
        symbols
    }
}

impl SymbolExtractor for RegexSymbolExtractor {
    fn extract(&self, text: &str) -> Vec<ProSymbol> {
        let mut objects = Vec::new();
        let mut symbols = self.extract_procedures(text, &mut objects);
        // after procedures: `__define` class names must be known first
        symbols.extend(self.extract_functions(text, &mut objects));
        symbols.extend(self.extract_variables(text));
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn extract(text: &str) -> Vec<ProSymbol> {
        RegexSymbolExtractor::new().extract(text)
    }

    #[test]
    fn test_procedure_definition() {
        let text = indoc! {"
            pro addition, A=a, B=b
            compile_opt idl2
            result = a + b
            end
        "};
        let symbols = extract(text);

        let routines: Vec<_> = symbols.iter().filter(|s| !s.is_variable()).collect();
        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].name, "addition");
        assert_eq!(routines[0].detail, "Procedure");
        assert_eq!(routines[0].kind, SymbolKind::FUNCTION);
        assert_eq!(routines[0].range.start, Position::new(0, 4));
        assert_eq!(routines[0].range.end, Position::new(0, 12));
    }

    #[test]
    fn test_function_gets_parens() {
        let symbols = extract("function multiply, a, b\nreturn, a * b\nend\n");
        assert_eq!(symbols[0].name, "multiply()");
        assert_eq!(symbols[0].display_name, "multiply()");
        assert_eq!(symbols[0].detail, "Function");
        // range covers the bare identifier only
        assert_eq!(symbols[0].range.start, Position::new(0, 9));
        assert_eq!(symbols[0].range.end, Position::new(0, 17));
    }

    #[test]
    fn test_method_and_class_definition() {
        let text = indoc! {"
            function dataset::count
            return, self.n
            end

            pro dataset__define
            void = {dataset, n: 0L}
            end
        "};
        let symbols = extract(text);
        let class = symbols.iter().find(|s| s.kind == SymbolKind::CLASS).unwrap();
        assert_eq!(class.name, "dataset__define");
        assert_eq!(class.detail, "Procedure (class definition)");

        let method = symbols.iter().find(|s| s.kind == SymbolKind::METHOD).unwrap();
        assert_eq!(method.name, "dataset::count()");
        assert_eq!(method.detail, "Function method");
        // single class in the file: display name loses the class prefix
        assert_eq!(method.display_name, "::count()");
    }

    #[test]
    fn test_multi_class_file_keeps_qualified_names() {
        let text = indoc! {"
            pro alpha__define
            end
            pro beta__define
            end
            function alpha::get
            end
        "};
        let symbols = extract(text);
        let method = symbols.iter().find(|s| s.kind == SymbolKind::METHOD).unwrap();
        assert_eq!(method.display_name, "alpha::get()");
    }

    #[test]
    fn test_variable_with_constructor_rhs() {
        let text = indoc! {"
            pro demo
            a = obj_new('Foo', 12)
            b = a
            end
        "};
        let symbols = extract(text);
        let a = symbols.iter().find(|s| s.name == "a").unwrap();
        assert_eq!(a.kind, SymbolKind::VARIABLE);
        assert_eq!(a.next.as_deref(), Some("Foo()"));

        let b = symbols.iter().find(|s| s.name == "b").unwrap();
        assert_eq!(b.next.as_deref(), Some("a"));
    }

    #[test]
    fn test_assignment_after_then_and_else() {
        let text = "if n gt 0 then total = n else total = 0\n";
        let symbols = extract(text);
        let totals: Vec<_> = symbols.iter().filter(|s| s.name == "total").collect();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].range.start.character, 15);
    }

    #[test]
    fn test_continuation_line_is_not_an_assignment() {
        let text = indoc! {"
            plot, data, $
            title = 'ignored'
            real = 5
        "};
        let symbols = extract(text);
        assert!(symbols.iter().all(|s| s.name != "title"));
        assert!(symbols.iter().any(|s| s.name == "real"));
    }

    #[test]
    fn test_empty_file_has_no_symbols() {
        assert!(extract("").is_empty());
        assert!(extract("\n\n\n").is_empty());
    }

    #[test]
    fn test_ranges_on_later_lines() {
        // comment stripping upstream leaves blank lines in place
        let cleaned = "\n\npro second\nend\n";
        let symbols = extract(cleaned);
        assert_eq!(symbols[0].range.start, Position::new(2, 4));
    }
}
