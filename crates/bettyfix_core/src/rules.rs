//! Mechanical fix rules for betty findings.
//!
//! Each rule pairs the betty message fragments that select it with a pure
//! function computing the edits. Rules never touch the document; they only
//! describe edits for [`crate::fixer`] or an editor client to apply.

use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostic::TextEdit;
use crate::document::Document;

/// Inclusive line range a fix operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The one-line range owning a single diagnostic.
    pub fn single(line: u32) -> Self {
        Self { start: line, end: line }
    }
}

/// Computes edits for a document, restricted to `range` when given and
/// covering the whole document otherwise.
pub type FixFn = fn(&Document, Option<LineRange>) -> Vec<TextEdit>;

/// One entry in the fix table.
pub struct FixRule {
    /// Message fragments that select this rule.
    pub patterns: &'static [&'static str],
    /// The edit computer.
    pub apply: FixFn,
}

/// Registered rules in dispatch order. The first fragment found in a
/// message wins; fragments are checked table-first, then in their listed
/// order within an entry.
pub static RULES: &[FixRule] = &[
    FixRule {
        patterns: &[
            "indentation should be tabs",
            "no spaces at the start of a line",
        ],
        apply: spaces_to_tabs,
    },
    FixRule {
        patterns: &["trailing whitespace"],
        apply: strip_trailing_whitespace,
    },
    FixRule {
        patterns: &["adding a line without newline at end of file"],
        apply: terminal_newline,
    },
    FixRule {
        patterns: &["parentheses are required on a return statement"],
        apply: parenthesize_return,
    },
    FixRule {
        patterns: &["Missing a blank line after declarations"],
        apply: blank_line_after_declaration,
    },
];

/// First table entry one of whose fragments occurs in `message`, together
/// with the fragment that matched. `None` means the finding has no
/// mechanical fix.
pub fn find_rule(message: &str) -> Option<(&'static FixRule, &'static str)> {
    RULES.iter().find_map(|rule| {
        rule.patterns
            .iter()
            .find(|pattern| message.contains(**pattern))
            .map(|pattern| (rule, *pattern))
    })
}

/// Clamps an optional range against the document, defaulting to the whole
/// document.
fn bounds(document: &Document, range: Option<LineRange>) -> (u32, u32) {
    let last = document.line_count().saturating_sub(1);
    match range {
        Some(r) => (r.start, r.end.min(last)),
        None => (0, last),
    }
}

/// Replaces leading space runs with tabs, one tab per four spaces.
///
/// Runs shorter than four spaces stay as they are; they cannot become a
/// full tab. Lines already indented with tabs are left alone, so a second
/// pass finds nothing to do.
fn spaces_to_tabs(document: &Document, range: Option<LineRange>) -> Vec<TextEdit> {
    let (start, end) = bounds(document, range);
    let mut edits = Vec::new();
    for line in start..=end {
        let Some(text) = document.line_text(line) else { continue };
        let spaces = text.chars().take_while(|c| *c == ' ').count();
        let tabs = spaces / 4;
        if tabs == 0 {
            continue;
        }
        edits.push(TextEdit::replace(line, 0, spaces as u32, "\t".repeat(tabs)));
    }
    edits
}

/// Deletes trailing space and tab runs.
fn strip_trailing_whitespace(document: &Document, range: Option<LineRange>) -> Vec<TextEdit> {
    let (start, end) = bounds(document, range);
    let mut edits = Vec::new();
    for line in start..=end {
        let Some(text) = document.line_text(line) else { continue };
        let kept = text.trim_end_matches([' ', '\t']).chars().count() as u32;
        let len = text.chars().count() as u32;
        if kept < len {
            edits.push(TextEdit::delete(line, kept, len));
        }
    }
    edits
}

/// Appends a newline when the document does not end with one.
///
/// The range is ignored: end-of-file is a whole-document property. A
/// document needs at least two lines with both the last and the
/// second-to-last non-empty before the fix applies; a document already
/// ending in a newline has an empty final line and is skipped.
fn terminal_newline(document: &Document, _range: Option<LineRange>) -> Vec<TextEdit> {
    let count = document.line_count();
    if count < 2 {
        return Vec::new();
    }
    let last_text = document.line_text(count - 1).unwrap_or("");
    let before_text = document.line_text(count - 2).unwrap_or("");
    if last_text.is_empty() || before_text.is_empty() {
        return Vec::new();
    }
    vec![TextEdit::insert(count - 1, last_text.chars().count() as u32, "\n")]
}

fn return_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"return(\s+)(.*);").expect("return pattern compiles"))
}

/// Wraps bare return values in parentheses.
///
/// `return x;` becomes `return (x);`. Values already starting with `(` or
/// ending with `)` are left alone, so `return (x);` and casts like
/// `return f(x);` survive a second pass unchanged.
fn parenthesize_return(document: &Document, range: Option<LineRange>) -> Vec<TextEdit> {
    let (start, end) = bounds(document, range);
    let mut edits = Vec::new();
    for line in start..=end {
        let Some(text) = document.line_text(line) else { continue };
        let Some(caps) = return_pattern().captures(text) else { continue };
        let (Some(gap), Some(value)) = (caps.get(1), caps.get(2)) else { continue };
        let expr = value.as_str();
        if expr.starts_with('(') || expr.ends_with(')') {
            continue;
        }
        // Regex offsets are bytes; columns are characters.
        let start_col = text[..gap.start()].chars().count() as u32;
        let end_col = text[..value.end()].chars().count() as u32;
        edits.push(TextEdit::replace(line, start_col, end_col, format!(" ({expr})")));
    }
    edits
}

fn declaration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\b(?:(?:auto\s*|const\s*|unsigned\s*|signed\s*|register\s*|volatile\s*|static\s*|void\s*|short\s*|long\s*|char\s*|int\s*|float\s*|double\s*|_Bool\s*|complex\s*)+)(?:\s+\*?\*?\s*)([a-zA-Z_][a-zA-Z0-9_]*)\s*[\[;,=)]",
        )
        .expect("declaration pattern compiles")
    })
}

/// Inserts a blank line between a variable declaration and the statement
/// that follows it.
///
/// Betty points at the statement after the declaration, so a given range
/// is widened one line upward to put the declaration itself in scope.
/// Each line in the range is paired with its successor; the last document
/// line has none and is never a match site.
fn blank_line_after_declaration(document: &Document, range: Option<LineRange>) -> Vec<TextEdit> {
    let count = document.line_count();
    if count == 0 {
        return Vec::new();
    }
    let (start, end) = match range {
        Some(r) => (r.start.saturating_sub(1), r.end.min(count - 1)),
        None => (0, count - 1),
    };
    let mut edits = Vec::new();
    for line in start..end {
        let Some(text) = document.line_text(line) else { continue };
        let Some(next) = document.line_text(line + 1) else { continue };
        if next.is_empty() || !declaration_pattern().is_match(text) {
            continue;
        }
        edits.push(TextEdit::insert(line, text.chars().count() as u32, "\n"));
    }
    edits
}
