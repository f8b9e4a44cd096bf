//! Conversions between core types and LSP protocol types.
//!
//! Core columns count Unicode scalar values; LSP positions count UTF-16
//! code units. The two drift apart on lines containing characters beyond
//! the basic plane, so every conversion re-measures its columns against
//! the line's current text.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, TextEdit};

use bettyfix_core::{
    Diagnostic as BettyDiagnostic, Document, Severity, Span, TextEdit as BettyTextEdit,
};

/// Converts a betty diagnostic to an LSP diagnostic.
pub(crate) fn to_lsp_diagnostic(diag: &BettyDiagnostic, document: &Document) -> Diagnostic {
    Diagnostic {
        range: span_to_range(diag.line, diag.span, document),
        severity: Some(match diag.severity {
            Severity::Error => DiagnosticSeverity::ERROR,
            Severity::Warning => DiagnosticSeverity::WARNING,
        }),
        source: Some(diag.source.to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

/// Converts a line-local span to an LSP range.
///
/// Spans built from empty lines start at column -1; LSP columns are
/// unsigned, so the sentinel clamps to 0 here and nowhere earlier.
pub(crate) fn span_to_range(line: u32, span: Span, document: &Document) -> Range {
    let text = document.line_text(line).unwrap_or("");
    let start = utf16_col(text, span.start.max(0) as u32);
    let end = utf16_col(text, span.end.max(0) as u32);
    Range::new(Position::new(line, start), Position::new(line, end))
}

/// Converts a planned core edit to an LSP text edit.
pub(crate) fn to_lsp_edit(edit: &BettyTextEdit, document: &Document) -> TextEdit {
    let text = document.line_text(edit.line).unwrap_or("");
    TextEdit {
        range: Range::new(
            Position::new(edit.line, utf16_col(text, edit.start)),
            Position::new(edit.line, utf16_col(text, edit.end)),
        ),
        new_text: edit.text.clone(),
    }
}

/// Re-measures a character column in UTF-16 code units.
fn utf16_col(line_text: &str, char_col: u32) -> u32 {
    line_text
        .chars()
        .take(char_col as usize)
        .map(|ch| ch.len_utf16() as u32)
        .sum()
}
