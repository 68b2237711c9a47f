use crate::cache;
use crate::patch::{ByteRange, MatchRecord};
use crate::sg::errors::SearchError;
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_core::{AstGrep, NodeMatch};
use ast_grep_language::SupportLang;
use std::collections::HashMap;

/// A match from an ast-grep pattern with captured metavariables.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Byte range of the entire match
    pub range: ByteRange,
    /// The matched text
    pub text: String,
    /// Captured metavariables: name -> text
    pub captures: HashMap<String, String>,
}

/// Pattern matcher over one parsed document.
///
/// # Metavariable Syntax
///
/// - `$NAME` - Matches a single node and captures it
/// - `$$$NAME` - Matches zero or more nodes (variadic)
/// - `$_` - Matches any single node (anonymous)
pub struct PatternMatcher {
    source: String,
    lang: SupportLang,
    sg: AstGrep<StrDoc<SupportLang>>,
}

impl PatternMatcher {
    pub fn new(source: &str, lang: SupportLang) -> Self {
        let sg = AstGrep::new(source, lang);
        Self {
            source: source.to_string(),
            lang,
            sg,
        }
    }

    /// Find all matches for a pattern in document order.
    ///
    /// Nested matches are reported after the match that encloses them, so
    /// the sequence may overlap.
    pub fn find_all(&self, pattern: &str) -> Result<Vec<PatternMatch>, SearchError> {
        let pat = cache::get_or_compile_pattern(pattern, self.lang)?;
        let root = self.sg.root();
        let results = root
            .find_all(&pat)
            .map(|m| self.node_match_to_pattern_match(m))
            .collect();
        Ok(results)
    }

    /// Find all matches and render `rewrite` for each of them.
    ///
    /// Rendering is ast-grep's own fixer, so `$$$ARGS` expands to the
    /// original source between the first and last captured node and
    /// multi-line replacements are re-indented to the match.
    pub fn rewrite_all(&self, pattern: &str, rewrite: &str) -> Result<Vec<MatchRecord>, SearchError> {
        let pat = cache::get_or_compile_pattern(pattern, self.lang)?;
        let root = self.sg.root();
        let records = root
            .find_all(&pat)
            .map(|m| {
                let range = m.get_node().range();
                let edit = m.replace_by(rewrite);
                MatchRecord {
                    range: ByteRange::new(range.start, range.end),
                    replacement: String::from_utf8_lossy(&edit.inserted_text).into_owned(),
                }
            })
            .collect();
        Ok(records)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn node_match_to_pattern_match(&self, m: NodeMatch<StrDoc<SupportLang>>) -> PatternMatch {
        let range = m.get_node().range();
        let text = self.source[range.start..range.end].to_string();

        let env = m.get_env().clone();
        let captures: HashMap<String, String> = env.into();

        PatternMatch {
            range: ByteRange::new(range.start, range.end),
            text,
            captures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::rewrite;

    #[test]
    fn find_method_calls() {
        let source = r#"
fn test() {
    let a = foo.clone();
    let b = bar.clone();
    let c = baz.to_string();
}
"#;
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let matches = matcher.find_all("$EXPR.clone()").unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].captures.get("EXPR").map(String::as_str), Some("foo"));
        assert_eq!(matches[1].captures.get("EXPR").map(String::as_str), Some("bar"));
    }

    #[test]
    fn byte_spans_accurate() {
        let source = "fn foo() { let x = 1; }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let matches = matcher.find_all("fn $NAME() { $$$BODY }").unwrap();

        assert_eq!(matches.len(), 1);
        let range = matches[0].range;
        assert_eq!(&source[range.start..range.end], source);
    }

    #[test]
    fn matches_arrive_in_document_order() {
        let source = "fn f() { a.clone(); b.clone(); c.clone(); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let matches = matcher.find_all("$E.clone()").unwrap();

        let starts: Vec<_> = matches.iter().map(|m| m.range.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn rewrite_all_expands_captures() {
        let source = "fn t() { let a = x.clone(); let b = y.clone(); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let records = matcher
            .rewrite_all("$EXPR.clone()", "$EXPR.to_owned()")
            .unwrap();

        assert_eq!(records.len(), 2);
        let out = rewrite(source.as_bytes(), &records);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "fn t() { let a = x.to_owned(); let b = y.to_owned(); }"
        );
    }

    #[test]
    fn nested_matches_are_dropped_by_builder() {
        // The outer call contains an inner match; only the outer is applied.
        let source = "fn t() { foo(foo(1)); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let records = matcher.rewrite_all("foo($A)", "bar($A)").unwrap();

        assert_eq!(records.len(), 2);
        let out = rewrite(source.as_bytes(), &records);
        assert_eq!(String::from_utf8(out).unwrap(), "fn t() { bar(foo(1)); }");
    }

    #[test]
    fn variadic_capture_keeps_separators() {
        let source = "fn t() { call(a, b, c); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let records = matcher
            .rewrite_all("call($$$ARGS)", "other($$$ARGS)")
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].replacement, "other(a, b, c)");
        let out = rewrite(source.as_bytes(), &records);
        assert_eq!(String::from_utf8(out).unwrap(), "fn t() { other(a, b, c); }");
    }

    #[test]
    fn empty_variadic_capture() {
        let source = "fn t() { call(); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let records = matcher
            .rewrite_all("call($$$ARGS)", "other($$$ARGS)")
            .unwrap();

        assert_eq!(records[0].replacement, "other()");
    }

    #[test]
    fn empty_rewrite_deletes_match() {
        let source = "fn t() { let a = x.clone(); }";
        let matcher = PatternMatcher::new(source, SupportLang::Rust);
        let records = matcher.rewrite_all("$E.clone()", "").unwrap();

        assert_eq!(records[0].replacement, "");
        let out = rewrite(source.as_bytes(), &records);
        assert_eq!(String::from_utf8(out).unwrap(), "fn t() { let a = ; }");
    }

    #[test]
    fn python_source_is_supported() {
        let source = "x = connect(host, port)\n";
        let matcher = PatternMatcher::new(source, SupportLang::Python);
        let records = matcher
            .rewrite_all("connect($A, $B)", "async_connect($A, $B)")
            .unwrap();
        let out = rewrite(source.as_bytes(), &records);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "x = async_connect(host, port)\n"
        );
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let matcher = PatternMatcher::new("fn main() {}", SupportLang::Rust);
        let result = matcher.find_all("");
        assert!(matches!(result, Err(SearchError::InvalidPattern { .. })));
    }
}
