//! Fix planning and application.
//!
//! Planning produces [`FixAction`]s, atomic edit sets a caller applies in
//! one step. Application resolves the edits to byte ranges against the
//! current text and rewrites it, the same way an editor client applies the
//! edits it receives.

use std::path::Path;

use tracing::{debug, warn};

use crate::diagnostic::{Diagnostic, TextEdit};
use crate::document::Document;
use crate::error::LintError;
use crate::rules::{self, LineRange, RULES};

/// Number of whole-document fix passes before giving up on convergence.
pub const DEFAULT_MAX_PASSES: usize = 3;

/// A planned, not yet applied edit set with a user-facing title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixAction {
    pub title: String,
    pub edits: Vec<TextEdit>,
}

impl FixAction {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Plans the fix for a single diagnostic.
///
/// Dispatches on the message: the first registered fragment contained in
/// it selects the rule, which then runs over the diagnostic's own line.
/// `None` means no rule recognizes the message. A recognized message can
/// still yield an empty action when the line offers nothing to change.
pub fn fix_for(document: &Document, diagnostic: &Diagnostic) -> Option<FixAction> {
    let (rule, pattern) = rules::find_rule(&diagnostic.message)?;
    let edits = (rule.apply)(document, Some(LineRange::single(diagnostic.line)));
    Some(FixAction {
        title: format!("Fix {pattern}"),
        edits,
    })
}

/// Plans the whole-document pass: every rule in table order, edits merged
/// into one atomic set with overlaps dropped.
pub fn fix_all(document: &Document) -> FixAction {
    let mut edits = Vec::new();
    for rule in RULES {
        edits.extend((rule.apply)(document, None));
    }
    FixAction {
        title: "Fix all recognized betty issues".to_string(),
        edits: merge_without_overlaps(edits),
    }
}

/// Drops edits that overlap a later-starting edit on the same line, so the
/// merged set stays atomically applicable.
fn merge_without_overlaps(mut edits: Vec<TextEdit>) -> Vec<TextEdit> {
    if edits.len() <= 1 {
        return edits;
    }
    edits.sort_by(|a, b| (b.line, b.start, b.end).cmp(&(a.line, a.start, a.end)));

    let mut kept: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        let overlaps = kept
            .last()
            .is_some_and(|last| last.line == edit.line && edit.end > last.start);
        if overlaps {
            warn!(line = edit.line, "edit overlaps a later one, dropping");
            continue;
        }
        kept.push(edit);
    }
    kept.reverse();
    kept
}

/// Result of applying an edit set to a text buffer.
#[derive(Debug)]
pub struct AppliedFixes {
    /// Edits that survived resolution and overlap filtering.
    pub applied: usize,
    /// The rewritten text.
    pub content: String,
    /// Whether the text differs from the input.
    pub modified: bool,
}

/// Applies an edit set to `source`, returning the rewritten text.
///
/// Edits resolve to byte ranges against `source` and apply back to front
/// so earlier offsets stay valid. An edit that no longer resolves (the
/// text changed under it) is skipped with a warning, as is an edit
/// overlapping one already applied; the later-starting edit wins.
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> AppliedFixes {
    let document = Document::new(source);

    let mut resolved: Vec<(usize, usize, &str)> = Vec::with_capacity(edits.len());
    for edit in edits {
        let (Some(start), Some(end)) = (
            document.offset_at(edit.line, edit.start),
            document.offset_at(edit.line, edit.end),
        ) else {
            warn!(
                line = edit.line,
                start = edit.start,
                end = edit.end,
                "edit does not resolve against current text, skipping"
            );
            continue;
        };
        if start > end {
            warn!(line = edit.line, "edit range is inverted, skipping");
            continue;
        }
        resolved.push((start, end, edit.text.as_str()));
    }

    resolved.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut content = source.to_string();
    let mut applied = 0usize;
    let mut last_start = usize::MAX;
    for (start, end, text) in resolved {
        if end > last_start {
            warn!(start, end, "edit overlaps one already applied, skipping");
            continue;
        }
        content.replace_range(start..end, text);
        last_start = start;
        applied += 1;
    }

    let modified = content != source;
    AppliedFixes {
        applied,
        content,
        modified,
    }
}

/// How a convergent fix run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixConvergence {
    /// A pass found nothing left to fix.
    Converged { passes: usize },
    /// The pass budget ran out with fixes still being produced.
    MaxPassesReached,
    /// The content started repeating instead of settling.
    CycleDetected { cycle_length: usize },
}

/// Outcome of [`fix_until_clean`].
#[derive(Debug)]
pub struct FixRun {
    /// Final text.
    pub content: String,
    /// Total edits applied across all passes.
    pub edits_applied: usize,
    pub convergence: FixConvergence,
}

/// Runs whole-document fix passes until a pass produces no edits.
///
/// One fix can expose the next finding (converting spaces to tabs can
/// leave a trailing run to strip), so a single pass is not always enough.
/// The pass count includes the final pass that found nothing. Content
/// history guards against a pathological back-and-forth between states.
pub fn fix_until_clean(source: &str, max_passes: usize) -> FixRun {
    let mut content = source.to_string();
    let mut history = vec![content.clone()];
    let mut edits_applied = 0usize;
    let mut passes = 0usize;

    while passes < max_passes {
        passes += 1;
        let action = {
            let document = Document::new(&content);
            fix_all(&document)
        };
        if action.edits.is_empty() {
            return FixRun {
                content,
                edits_applied,
                convergence: FixConvergence::Converged { passes },
            };
        }

        let outcome = apply_edits(&content, &action.edits);
        edits_applied += outcome.applied;
        if !outcome.modified {
            // Edits were planned but none survived application.
            return FixRun {
                content,
                edits_applied,
                convergence: FixConvergence::Converged { passes },
            };
        }
        content = outcome.content;

        if let Some(position) = history.iter().position(|past| *past == content) {
            let cycle_length = history.len() - position;
            warn!(cycle_length, "fix passes cycle instead of converging");
            return FixRun {
                content,
                edits_applied,
                convergence: FixConvergence::CycleDetected { cycle_length },
            };
        }
        history.push(content.clone());
    }

    debug!(max_passes, "fix passes stopped at the budget");
    FixRun {
        content,
        edits_applied,
        convergence: FixConvergence::MaxPassesReached,
    }
}

/// Runs the convergent fix pass against a file on disk, writing back only
/// when something changed.
pub fn fix_file(path: &Path, max_passes: usize) -> Result<FixRun, LintError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LintError::file(format!("failed to read {}: {e}", path.display())))?;
    let run = fix_until_clean(&content, max_passes);
    if run.content != content {
        std::fs::write(path, &run.content)
            .map_err(|e| LintError::file(format!("failed to write {}: {e}", path.display())))?;
    }
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, Severity, Span};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_replace_and_delete() {
        let source = "int x;   \nreturn 0;\n";
        let edits = vec![TextEdit::delete(0, 6, 9), TextEdit::replace(1, 7, 8, "(0)")];
        let outcome = apply_edits(source, &edits);
        assert_eq!(outcome.content, "int x;\nreturn (0);\n");
        assert_eq!(outcome.applied, 2);
        assert!(outcome.modified);
    }

    #[test]
    fn test_apply_edits_back_to_front() {
        // Both edits on one line; applying the first would shift the second.
        let source = "        return 0;   \n";
        let edits = vec![TextEdit::replace(0, 0, 8, "\t\t"), TextEdit::delete(0, 17, 20)];
        let outcome = apply_edits(source, &edits);
        assert_eq!(outcome.content, "\t\treturn 0;\n");
    }

    #[test]
    fn test_apply_skips_unresolvable_edits() {
        let source = "int x;\n";
        let edits = vec![
            TextEdit::delete(7, 0, 3),
            TextEdit::replace(0, 4, 99, "y"),
            TextEdit::replace(0, 4, 5, "y"),
        ];
        let outcome = apply_edits(source, &edits);
        assert_eq!(outcome.content, "int y;\n");
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn test_apply_overlapping_edits_keeps_later() {
        let source = "abcdef\n";
        let edits = vec![
            TextEdit::replace(0, 0, 4, "____"),
            TextEdit::replace(0, 2, 6, "XX"),
        ];
        let outcome = apply_edits(source, &edits);
        assert_eq!(outcome.content, "abXX\n");
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn test_apply_zero_width_inserts_at_one_point() {
        let source = "ab\n";
        let edits = vec![TextEdit::insert(0, 1, "x"), TextEdit::insert(0, 1, "y")];
        let outcome = apply_edits(source, &edits);
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.content.len(), 5);
        assert!(outcome.content.contains('x') && outcome.content.contains('y'));
    }

    #[test]
    fn test_apply_nothing_is_unmodified() {
        let outcome = apply_edits("int x;\n", &[]);
        assert!(!outcome.modified);
        assert_eq!(outcome.content, "int x;\n");
    }

    #[test]
    fn test_fix_for_dispatches_on_message() {
        let doc = Document::new("        return 0;\n");
        let diag = Diagnostic::new(
            0,
            Severity::Warning,
            "Betty: indentation should be tabs",
            Span::new(8, 17),
        );
        let action = fix_for(&doc, &diag).unwrap();
        assert_eq!(action.title, "Fix indentation should be tabs");
        assert_eq!(action.edits, vec![TextEdit::replace(0, 0, 8, "\t\t")]);
    }

    #[test]
    fn test_fix_for_unrecognized_message() {
        let doc = Document::new("int x\n");
        let diag = Diagnostic::new(0, Severity::Error, "missing semicolon", Span::new(0, 5));
        assert!(fix_for(&doc, &diag).is_none());
    }

    #[test]
    fn test_fix_for_recognized_but_nothing_to_change() {
        let doc = Document::new("\tint x;\n");
        let diag = Diagnostic::new(
            0,
            Severity::Warning,
            "indentation should be tabs",
            Span::new(1, 7),
        );
        let action = fix_for(&doc, &diag).unwrap();
        assert!(action.is_empty());
    }

    #[test]
    fn test_fix_all_merges_rules() {
        let doc = Document::new("int main(void)\n{\n        return 0;   \n}");
        let action = fix_all(&doc);
        assert_eq!(action.edits.len(), 4);

        let outcome = apply_edits(doc.source(), &action.edits);
        assert_eq!(outcome.content, "int main(void)\n{\n\t\treturn (0);\n}\n");
    }

    #[test]
    fn test_fix_all_leaves_unfixable_findings_alone() {
        // Mirrors a two-finding report where only the trailing-whitespace
        // line has a mechanical fix.
        let doc = Document::new("\n\n\n\n  int y\n\n\n\nint z;   ");
        let action = fix_all(&doc);
        assert_eq!(action.edits, vec![TextEdit::delete(8, 6, 9)]);
    }

    #[test]
    fn test_fix_until_clean_converges() {
        let run = fix_until_clean(
            "int main(void)\n{\n        return 0;   \n}",
            DEFAULT_MAX_PASSES,
        );
        assert_eq!(run.content, "int main(void)\n{\n\t\treturn (0);\n}\n");
        assert_eq!(run.convergence, FixConvergence::Converged { passes: 2 });
        assert_eq!(run.edits_applied, 4);
    }

    #[test]
    fn test_fix_until_clean_already_clean() {
        let run = fix_until_clean("int x;\n\nreturn (0);\n", DEFAULT_MAX_PASSES);
        assert_eq!(run.convergence, FixConvergence::Converged { passes: 1 });
        assert_eq!(run.edits_applied, 0);
        assert_eq!(run.content, "int x;\n\nreturn (0);\n");
    }

    #[test]
    fn test_fix_until_clean_zero_budget() {
        let run = fix_until_clean("        x\n", 0);
        assert_eq!(run.convergence, FixConvergence::MaxPassesReached);
        assert_eq!(run.content, "        x\n");
    }

    #[test]
    fn test_fix_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messy.c");
        std::fs::write(&path, "int main(void)\n{\n\treturn 0;   \n}\n").unwrap();

        let run = fix_file(&path, DEFAULT_MAX_PASSES).unwrap();
        assert!(run.edits_applied > 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "int main(void)\n{\n\treturn (0);\n}\n"
        );
    }

    #[test]
    fn test_fix_file_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.c");
        assert!(matches!(
            fix_file(&path, DEFAULT_MAX_PASSES),
            Err(LintError::File(_))
        ));
    }
}
