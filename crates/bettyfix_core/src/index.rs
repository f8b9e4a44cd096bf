//! Per-document diagnostic state.
//!
//! A betty run is reduced to a deduplicated diagnostic list plus a
//! severity-partitioned line index, bundled per document. Reruns replace
//! the whole bundle; nothing in here is patched incrementally.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::diagnostic::{Diagnostic, Severity, Span};
use crate::document::Document;
use crate::parse::{self, ParsedLine};

/// Everything one betty run produced for one document.
#[derive(Debug, Default)]
pub struct DocumentDiagnostics {
    diagnostics: Vec<Diagnostic>,
    index: DiagnosticIndex,
}

impl DocumentDiagnostics {
    /// Builds the diagnostic set for `document` from parsed report lines.
    ///
    /// Spans are measured against the document's current text, not the
    /// text betty saw. Report lines pointing past the end of the document
    /// are dropped. Exact duplicates (same line, severity, message and
    /// span) collapse to the first occurrence, preserving report order.
    pub fn collect(parsed: Vec<ParsedLine>, document: &Document) -> Self {
        let mut diagnostics = Vec::new();
        let mut seen = HashSet::new();
        let mut index = DiagnosticIndex::default();

        for report in parsed {
            let Some(text) = document.line_text(report.line) else {
                debug!(line = report.line, "report line outside document, skipping");
                continue;
            };
            let diag = Diagnostic::new(
                report.line,
                report.severity,
                report.message,
                highlight_span(text),
            );
            if seen.insert(diag.clone()) {
                index.record(&diag);
                diagnostics.push(diag);
            }
        }

        Self { diagnostics, index }
    }

    /// Parses a raw betty output blob and builds the set in one step.
    pub fn from_output(output: &str, document: &Document) -> Self {
        Self::collect(parse::parse_output(output), document)
    }

    /// Diagnostics in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The severity-partitioned line index.
    pub fn index(&self) -> &DiagnosticIndex {
        &self.index
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.summary().errors > 0
    }

    /// Per-tier counts for status display.
    pub fn summary(&self) -> Summary {
        self.index.summary()
    }
}

/// Line-to-message lookup, kept separately per severity tier so an error
/// and a warning can coexist on one line.
#[derive(Debug, Default)]
pub struct DiagnosticIndex {
    errors: HashMap<u32, String>,
    warnings: HashMap<u32, String>,
}

impl DiagnosticIndex {
    fn record(&mut self, diag: &Diagnostic) {
        let tier = match diag.severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
        };
        // Later findings on the same line win within a tier.
        tier.insert(diag.line, diag.message.clone());
    }

    /// Message of the error recorded on `line`, if any.
    pub fn error_at(&self, line: u32) -> Option<&str> {
        self.errors.get(&line).map(String::as_str)
    }

    /// Message of the warning recorded on `line`, if any.
    pub fn warning_at(&self, line: u32) -> Option<&str> {
        self.warnings.get(&line).map(String::as_str)
    }

    /// Message shown for `line` when one slot is available: the error if
    /// there is one, the warning otherwise.
    pub fn message_at(&self, line: u32) -> Option<&str> {
        self.error_at(line).or_else(|| self.warning_at(line))
    }

    pub fn summary(&self) -> Summary {
        Summary {
            errors: self.errors.len(),
            warnings: self.warnings.len(),
        }
    }
}

/// Error and warning totals, one count per indexed line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
}

impl Summary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

/// Computes the highlight span for one line of source text.
///
/// Start is the count of leading blanks, end the character length. When
/// the two collide (empty or all-whitespace line) the start backs up one
/// column so a one-column highlight remains, which on an empty line is the
/// -1..0 sentinel.
fn highlight_span(text: &str) -> Span {
    let mut start = text.chars().take_while(|c| matches!(c, ' ' | '\t')).count() as i32;
    let end = text.chars().count() as i32;
    if start == end {
        start -= 1;
    }
    Span::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_output;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("int x;", 0, 6)]
    #[case("    foo();", 4, 10)]
    #[case("\tfoo();", 1, 7)]
    #[case("", -1, 0)]
    #[case("   ", 2, 3)]
    #[case("\t\t", 1, 2)]
    fn test_highlight_span(#[case] text: &str, #[case] start: i32, #[case] end: i32) {
        assert_eq!(highlight_span(text), Span::new(start, end));
    }

    #[test]
    fn test_collect_dedupes_identical_findings() {
        let doc = Document::new("int x;\nint y;\n");
        let output = "main.c:1:error: twice reported\nmain.c:1:error: twice reported\n";
        let set = DocumentDiagnostics::from_output(output, &doc);
        assert_eq!(set.diagnostics().len(), 1);
    }

    #[test]
    fn test_collect_keeps_distinct_findings_on_one_line() {
        let doc = Document::new("int x;\n");
        let output = "main.c:1:error: first\nmain.c:1:error: second\n";
        let set = DocumentDiagnostics::from_output(output, &doc);
        assert_eq!(set.diagnostics().len(), 2);
        // The index keeps one message per tier per line, the later one.
        assert_eq!(set.index().error_at(0), Some("second"));
        assert_eq!(set.summary(), Summary { errors: 1, warnings: 0 });
    }

    #[test]
    fn test_collect_skips_lines_outside_document() {
        let doc = Document::new("int x;\n");
        let output = "main.c:40:error: beyond the end\nmain.c:1:warning: in range\n";
        let set = DocumentDiagnostics::from_output(output, &doc);
        assert_eq!(set.diagnostics().len(), 1);
        assert_eq!(set.diagnostics()[0].line, 0);
    }

    #[test]
    fn test_tiers_coexist_on_one_line() {
        let doc = Document::new("int x ;\n");
        let output = "main.c:1:error: space before semicolon\nmain.c:1:warning: spacing\n";
        let set = DocumentDiagnostics::from_output(output, &doc);
        assert_eq!(set.index().error_at(0), Some("space before semicolon"));
        assert_eq!(set.index().warning_at(0), Some("spacing"));
        // One slot callers read: the error shadows the warning.
        assert_eq!(set.index().message_at(0), Some("space before semicolon"));
        assert_eq!(set.summary(), Summary { errors: 1, warnings: 1 });
    }

    #[test]
    fn test_empty_output_is_clean() {
        let doc = Document::new("int x;\n");
        let set = DocumentDiagnostics::from_output("", &doc);
        assert!(set.is_empty());
        assert!(!set.has_errors());
        assert!(set.summary().is_clean());
    }

    #[test]
    fn test_report_order_is_preserved() {
        let doc = Document::new("a;\nb;\nc;\n");
        let output = "f.c:3:error: third\nf.c:1:error: first\nf.c:2:warning: second\n";
        let set = DocumentDiagnostics::from_output(output, &doc);
        let lines: Vec<u32> = set.diagnostics().iter().map(|d| d.line).collect();
        assert_eq!(lines, vec![2, 0, 1]);
    }

    #[test]
    fn test_two_findings_end_to_end() {
        let text = "\n\n\n\n  int y\n\n\n\nint z;   ";
        let doc = Document::new(text);
        let output = "main.c:5:Error: missing semicolon\nmain.c:9:Warning: trailing whitespace\n";

        let parsed = parse_output(output);
        assert_eq!(parsed.len(), 2);

        let set = DocumentDiagnostics::collect(parsed, &doc);
        let diags = set.diagnostics();
        assert_eq!(diags.len(), 2);

        assert_eq!(diags[0].line, 4);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].span, Span::new(2, 7));

        assert_eq!(diags[1].line, 8);
        assert_eq!(diags[1].severity, Severity::Warning);
        assert_eq!(diags[1].span, Span::new(0, 9));

        assert_eq!(set.summary(), Summary { errors: 1, warnings: 1 });
    }
}
