//! # bettyfix_core
//!
//! Core engine for bettyfix: parses the betty C style checker's report
//! output into structured diagnostics, indexes them per document, and
//! plans mechanical auto-fixes as atomic text-edit sets.
//!
//! Everything in this crate is synchronous and pure: text in, diagnostics
//! and edits out. Invoking the betty process lives in `bettyfix_runner`;
//! the editor and command-line surfaces live in `bettyfix_lsp` and the
//! `bettyfix` binary.

mod config;
mod diagnostic;
mod document;
mod error;
mod fixer;
mod index;
mod parse;
mod rules;

pub use config::Config;
pub use diagnostic::{Diagnostic, SOURCE_TAG, Severity, Span, TextEdit};
pub use document::Document;
pub use error::LintError;
pub use fixer::{
    AppliedFixes, DEFAULT_MAX_PASSES, FixAction, FixConvergence, FixRun, apply_edits, fix_all,
    fix_file, fix_for, fix_until_clean,
};
pub use index::{DiagnosticIndex, DocumentDiagnostics, Summary};
pub use parse::{
    ParsedLine, TOOL_MISSING_SIGNATURE, output_reports_missing_tool, parse_line, parse_output,
};
pub use rules::{FixFn, FixRule, LineRange, RULES, find_rule};
