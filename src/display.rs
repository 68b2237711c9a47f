//! UI-facing projections of match records.

use crate::patch::{ByteRange, MatchRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Zero-based line and column; columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A region to select or reveal in an editor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Resolve a byte range of `bytes` to display positions.
    pub fn from_range(bytes: &[u8], range: ByteRange) -> Self {
        Self {
            start: position_at(bytes, range.start),
            end: position_at(bytes, range.end),
        }
    }
}

/// Resolve a byte offset to a display position. Offsets past the end clamp.
pub fn position_at(bytes: &[u8], offset: usize) -> Position {
    let offset = offset.min(bytes.len());
    let prefix = &bytes[..offset];
    let line_start = prefix
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let line = prefix.iter().filter(|&&b| b == b'\n').count();
    let column = String::from_utf8_lossy(&prefix[line_start..]).chars().count();
    Position { line, column }
}

/// One search hit as the result list shows it: the match and the text
/// around it on its first and last lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayResult {
    pub file: String,
    pub range: ByteRange,
    pub start: Position,
    pub end: Position,
    pub before: String,
    pub matched: String,
    pub after: String,
    pub replacement: String,
}

impl DisplayResult {
    /// Project `record` against the document bytes it was found in.
    pub fn project(file: &Path, bytes: &[u8], record: &MatchRecord) -> Self {
        let start = record.range.start.min(bytes.len());
        let end = record.range.end.clamp(start, bytes.len());

        let line_start = bytes[..start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let line_end = bytes[end..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |i| end + i);

        let lossy = |slice: &[u8]| String::from_utf8_lossy(slice).into_owned();

        Self {
            file: file.to_string_lossy().into_owned(),
            range: ByteRange::new(start, end),
            start: position_at(bytes, start),
            end: position_at(bytes, end),
            before: lossy(&bytes[line_start..start]),
            matched: lossy(&bytes[start..end]),
            after: lossy(&bytes[end..line_end]),
            replacement: record.replacement.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_lines_and_chars() {
        let text = "fn a() {}\nlet é = 1;\n";
        let offset = text.find("= 1").unwrap();
        assert_eq!(position_at(text.as_bytes(), offset), Position::new(1, 6));
    }

    #[test]
    fn position_past_end_clamps() {
        assert_eq!(position_at(b"ab\nc", 99), Position::new(1, 1));
    }

    #[test]
    fn project_splits_line_around_match() {
        let bytes = b"fn main() {\n    let a = foo.clone();\n}\n";
        let text = std::str::from_utf8(bytes).unwrap();
        let start = text.find("foo.clone()").unwrap();
        let record = MatchRecord::new(start, start + 11, "foo.to_owned()");

        let result = DisplayResult::project(Path::new("src/main.rs"), bytes, &record);

        assert_eq!(result.before, "    let a = ");
        assert_eq!(result.matched, "foo.clone()");
        assert_eq!(result.after, ";");
        assert_eq!(result.start, Position::new(1, 12));
        assert_eq!(result.end, Position::new(1, 23));
        assert_eq!(result.replacement, "foo.to_owned()");
        assert_eq!(result.file, "src/main.rs");
    }

    #[test]
    fn project_multiline_match_keeps_outer_context() {
        let bytes = b"a(\n1,\n2) + b";
        let record = MatchRecord::new(0, 8, "c");
        let result = DisplayResult::project(Path::new("x.rs"), bytes, &record);
        assert_eq!(result.before, "");
        assert_eq!(result.matched, "a(\n1,\n2)");
        assert_eq!(result.after, " + b");
        assert_eq!(result.end, Position::new(2, 2));
    }
}
