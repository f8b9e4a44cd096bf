//! Diagnostic and text edit types.

use serde::Serialize;

/// Source tag attached to every diagnostic, so editor clients can tell
/// betty findings apart from other providers on the same document.
pub const SOURCE_TAG: &str = "betty";

/// Severity tier of a finding.
///
/// Betty only distinguishes errors from warnings. Any severity word other
/// than `error` (compared case-insensitively) is reported as a warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl Severity {
    /// Maps a raw severity word from betty's output.
    pub fn from_word(word: &str) -> Self {
        if word.trim().eq_ignore_ascii_case("error") {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

/// Character-column span within a single source line, half-open.
///
/// `start` is signed on purpose: when a reported line is empty or entirely
/// whitespace the span builder anchors the highlight just before the end of
/// the line, which on an empty line lands at column -1. Consumers that
/// cannot represent a negative column clamp at their own boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: i32,
    pub end: i32,
}

impl Span {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }
}

/// A structured finding derived from one betty report line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Diagnostic {
    /// 0-based line in the source document.
    pub line: u32,
    /// Severity tier.
    pub severity: Severity,
    /// Message text, inner colons preserved.
    pub message: String,
    /// Highlight span within the current text of `line`.
    pub span: Span,
    /// Issuing tool tag, always [`SOURCE_TAG`].
    pub source: &'static str,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            line,
            severity,
            message: message.into(),
            span,
            source: SOURCE_TAG,
        }
    }
}

/// A single line-local text replacement.
///
/// Replaces the half-open character-column range `[start, end)` on `line`
/// with `text`. `start == end` is an insertion; empty `text` is a deletion.
/// `text` may contain a newline (the end-of-file and blank-line fixes
/// insert one).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextEdit {
    pub line: u32,
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl TextEdit {
    /// Creates an edit replacing `[start, end)` on `line` with `text`.
    pub fn replace(line: u32, start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            line,
            start,
            end,
            text: text.into(),
        }
    }

    /// Creates an edit inserting `text` at `col` on `line`.
    pub fn insert(line: u32, col: u32, text: impl Into<String>) -> Self {
        Self::replace(line, col, col, text)
    }

    /// Creates an edit deleting `[start, end)` on `line`.
    pub fn delete(line: u32, start: u32, end: u32) -> Self {
        Self::replace(line, start, end, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_severity_from_word() {
        assert_eq!(Severity::from_word("error"), Severity::Error);
        assert_eq!(Severity::from_word("ERROR"), Severity::Error);
        assert_eq!(Severity::from_word(" Error "), Severity::Error);
        assert_eq!(Severity::from_word("warning"), Severity::Warning);
        assert_eq!(Severity::from_word("WARNING"), Severity::Warning);
        assert_eq!(Severity::from_word("note"), Severity::Warning);
        assert_eq!(Severity::from_word(""), Severity::Warning);
    }

    #[test]
    fn test_diagnostic_carries_source_tag() {
        let diag = Diagnostic::new(3, Severity::Error, "missing semicolon", Span::new(0, 5));
        assert_eq!(diag.source, "betty");
    }

    #[test]
    fn test_identical_diagnostics_hash_equal() {
        let a = Diagnostic::new(3, Severity::Error, "missing semicolon", Span::new(0, 5));
        let b = Diagnostic::new(3, Severity::Error, "missing semicolon", Span::new(0, 5));
        let c = Diagnostic::new(3, Severity::Warning, "missing semicolon", Span::new(0, 5));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        assert!(set.insert(c));
    }

    #[test]
    fn test_edit_constructors() {
        let insert = TextEdit::insert(2, 4, "\n");
        assert_eq!(insert.start, insert.end);
        assert_eq!(insert.text, "\n");

        let delete = TextEdit::delete(2, 4, 9);
        assert_eq!(delete.text, "");
        assert_eq!((delete.start, delete.end), (4, 9));
    }
}
