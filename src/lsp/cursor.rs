//! Cursor word resolution
//!
//! Given a line of cleaned text and a cursor position, determines the
//! identifier under (or just left of) the cursor and classifies its call
//! shape: function vs. procedure, object-qualified method vs. plain
//! routine, left or right of an assignment. The resolver only looks at
//! one line plus the variable symbols defined above it; it never parses.

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::Position;

use super::symbols::ProSymbol;

/// Identifier-shaped token, method accessors included.
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[.a-z0-9:_$>-]+").unwrap());

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '_' | '$' | '-' | '>')
}

/// The resolved word at a cursor position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorWord {
    /// Full matched token, method accessors included.
    pub name: String,
    /// Name to search the index with; methods become `::name` or
    /// `Class::name` when the object variable could be qualified.
    pub search_name: String,
    /// Method calls only: the object variable left of the accessor.
    pub obj_name: String,
    /// Method calls only: the member right of the accessor.
    pub method_name: String,
    pub is_function: bool,
    pub is_method: bool,
    /// An `=` appears strictly left of the cursor: an assignment target
    /// position, where a function call is the likelier shape.
    pub equal_before: bool,
}

impl CursorWord {
    fn plain(name: String, equal_before: bool) -> Self {
        CursorWord {
            search_name: name.clone(),
            name,
            equal_before,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Resolves the word at `position` within `line`.
///
/// `preceding_variables` are the variable symbols defined above the
/// cursor's line, nearest first; they qualify `obj.method` calls to
/// `Class::method` when the object was assigned from a constructor. The
/// first variable whose name matches wins (closest definition shadows).
pub fn resolve_word(
    line: &str,
    position: Position,
    preceding_variables: &[&ProSymbol],
) -> CursorWord {
    let chars: Vec<char> = line.chars().collect();

    let equal_before = chars
        .iter()
        .position(|&c| c == '=')
        .map_or(false, |idx| idx < position.character as usize);

    // widen one character left so resolution works right after a word as
    // well as inside it
    let mut use_char = position.character as usize;
    if position.character > 0 {
        use_char -= 1;
        if use_char == 0 {
            let name: String = chars.first().into_iter().collect::<String>().trim().to_string();
            return CursorWord::plain(name, equal_before);
        }
        if chars.get(use_char).map_or(true, |&c| !is_word_char(c)) {
            use_char += 1;
        }
    }

    // pick the token whose span contains the (possibly widened) cursor
    let mut name = String::new();
    let mut is_function = false;
    for m in TOKEN_RE.find_iter(line) {
        let start = line[..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        if start <= use_char && end >= use_char {
            name = m.as_str().to_string();
            is_function = chars.get(end) == Some(&'(');
            break;
        }
    }

    if name.is_empty() {
        return CursorWord {
            equal_before,
            ..Default::default()
        };
    }

    // methods split on the last accessor so chained calls resolve the
    // final member
    let accessor = match (name.rfind('.'), name.rfind("->")) {
        (Some(d), Some(a)) => Some(if d > a { (d, 1) } else { (a, 2) }),
        (Some(d), None) => Some((d, 1)),
        (None, Some(a)) => Some((a, 2)),
        (None, None) => None,
    };

    match accessor {
        Some((idx, width)) => {
            let obj_name = name[..idx].to_string();
            let method_name = name[idx + width..].to_string();
            let mut search_name = format!("::{}", method_name);

            // constructor-to-method qualification via the closest
            // preceding variable of the same name
            for variable in preceding_variables {
                if variable.name.eq_ignore_ascii_case(&obj_name) {
                    if let Some(class) = constructor_class(variable.next.as_deref()) {
                        search_name = format!("{}::{}", class, method_name);
                    }
                    break;
                }
            }

            CursorWord {
                name,
                search_name,
                obj_name,
                method_name,
                is_function,
                is_method: true,
                equal_before,
            }
        }
        None => CursorWord {
            search_name: name.clone(),
            name,
            is_function,
            equal_before,
            ..Default::default()
        },
    }
}

/// Class name when an assignment RHS looks like a constructor call
/// (`Class(` with an identifier-shaped head).
fn constructor_class(next: Option<&str>) -> Option<&str> {
    let next = next?;
    let idx = next.find('(')?;
    let head = &next[..idx];
    let mut cs = head.chars();
    match cs.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return None,
    }
    if cs.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        Some(head)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Range, SymbolKind};

    fn variable(name: &str, next: &str) -> ProSymbol {
        ProSymbol {
            name: name.to_string(),
            display_name: name.to_string(),
            kind: SymbolKind::VARIABLE,
            detail: "Variable".to_string(),
            range: Range::default(),
            selection_range: Range::default(),
            next: Some(next.to_string()),
        }
    }

    #[test]
    fn test_method_call_with_open_paren() {
        let word = resolve_word("foo.bar(", Position::new(0, 7), &[]);
        assert!(word.is_method);
        assert!(word.is_function);
        assert_eq!(word.obj_name, "foo");
        assert_eq!(word.method_name, "bar");
        assert_eq!(word.search_name, "::bar");
    }

    #[test]
    fn test_arrow_accessor() {
        let word = resolve_word("obj->close", Position::new(0, 9), &[]);
        assert!(word.is_method);
        assert_eq!(word.obj_name, "obj");
        assert_eq!(word.method_name, "close");
        assert_eq!(word.search_name, "::close");
    }

    #[test]
    fn test_constructor_qualifies_method_search() {
        let a = variable("a", "Foo()");
        let word = resolve_word("a.doThing", Position::new(0, 8), &[&a]);
        assert_eq!(word.search_name, "Foo::doThing");
    }

    #[test]
    fn test_closest_variable_definition_wins() {
        let newer = variable("a", "Bar()");
        let older = variable("a", "Foo()");
        // nearest first: the Bar assignment shadows the Foo one
        let word = resolve_word("a.doThing", Position::new(0, 8), &[&newer, &older]);
        assert_eq!(word.search_name, "Bar::doThing");
    }

    #[test]
    fn test_non_constructor_rhs_leaves_bare_method() {
        let a = variable("a", "other");
        let word = resolve_word("a.doThing", Position::new(0, 8), &[&a]);
        assert_eq!(word.search_name, "::doThing");
    }

    #[test]
    fn test_equal_sign_left_of_cursor() {
        let word = resolve_word("result = total(x)", Position::new(0, 14), &[]);
        assert!(word.equal_before);
        assert!(word.is_function);
        assert_eq!(word.name, "total");
    }

    #[test]
    fn test_cursor_on_whitespace_is_empty() {
        let word = resolve_word("a      b", Position::new(0, 4), &[]);
        assert!(word.is_empty());
        assert!(!word.is_method);
    }

    #[test]
    fn test_empty_line_is_empty() {
        let word = resolve_word("", Position::new(0, 0), &[]);
        assert!(word.is_empty());
    }

    #[test]
    fn test_cursor_inside_word() {
        let word = resolve_word("plot, data", Position::new(0, 2), &[]);
        assert_eq!(word.name, "plot");
        assert!(!word.is_function);
    }
}
