//! Parser for betty report lines.
//!
//! Betty prints one finding per line in the shape
//! `<file>:<line>:<severity>: <message>`, interleaved with headers and
//! blank lines that carry no finding. The parser keeps the findings and
//! silently drops everything else.

use crate::diagnostic::Severity;

/// In-band signature the shell leaves in the output when the betty
/// executable is missing.
pub const TOOL_MISSING_SIGNATURE: &str = "betty: not found";

/// One report line reduced to its diagnostic fields.
///
/// The highlight span is not part of this type: it depends on the current
/// document text and is computed when the diagnostic set is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// 0-based source line (betty reports 1-based).
    pub line: u32,
    pub severity: Severity,
    pub message: String,
}

/// Parses a single line of betty output.
///
/// Returns `None` for anything that is not a finding: blank lines, file
/// headers, lines with fewer than four colon-separated fields, and lines
/// whose line-number field is not a positive integer. Colons after the
/// third field belong to the message and are kept.
pub fn parse_line(raw: &str) -> Option<ParsedLine> {
    if raw.trim().is_empty() {
        return None;
    }
    let fields: Vec<&str> = raw.split(':').collect();
    if fields.len() < 4 {
        return None;
    }
    let reported: u32 = fields[1].trim().parse().ok()?;
    if reported == 0 {
        // Betty lines are 1-based; 0 has no 0-based counterpart.
        return None;
    }
    let severity = Severity::from_word(fields[2]);
    let message = fields[3..].join(":").trim().to_string();
    Some(ParsedLine {
        line: reported - 1,
        severity,
        message,
    })
}

/// Parses a merged stdout/stderr blob into report lines, skipping
/// everything [`parse_line`] rejects.
pub fn parse_output(output: &str) -> Vec<ParsedLine> {
    output.lines().filter_map(parse_line).collect()
}

/// Returns true when the blob carries the missing-tool signature instead
/// of a report.
pub fn output_reports_missing_tool(output: &str) -> bool {
    output.contains(TOOL_MISSING_SIGNATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("main.c:5:ERROR: space before semicolon", 4, Severity::Error, "space before semicolon")]
    #[case("main.c:1:error: first line", 0, Severity::Error, "first line")]
    #[case("main.c:12:WARNING: line too long", 11, Severity::Warning, "line too long")]
    #[case("main.c:12:WaRnInG: odd casing", 11, Severity::Warning, "odd casing")]
    #[case("src/queue.c: 7 :Error: padded fields", 6, Severity::Error, "padded fields")]
    fn test_parse_line_findings(
        #[case] raw: &str,
        #[case] line: u32,
        #[case] severity: Severity,
        #[case] message: &str,
    ) {
        let parsed = parse_line(raw).unwrap();
        assert_eq!(parsed.line, line);
        assert_eq!(parsed.severity, severity);
        assert_eq!(parsed.message, message);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("main.c")]
    #[case("========== main.c ==========")]
    #[case("main.c:5: two fields only")]
    #[case("main.c:notanumber:error: bad line field")]
    #[case("main.c:5.5:error: fractional line")]
    #[case("main.c:0:error: below the first line")]
    #[case("main.c:-3:error: negative line")]
    fn test_parse_line_non_findings(#[case] raw: &str) {
        assert_eq!(parse_line(raw), None);
    }

    #[test]
    fn test_message_keeps_inner_colons() {
        let parsed = parse_line("main.c:3:error: expected ';' after: expression").unwrap();
        assert_eq!(parsed.message, "expected ';' after: expression");
    }

    #[test]
    fn test_unknown_severity_word_downgrades_to_warning() {
        let parsed = parse_line("main.c:3:fatal: unknown tier").unwrap();
        assert_eq!(parsed.severity, Severity::Warning);
    }

    #[test]
    fn test_parse_output_skips_noise() {
        let output = "\n\
            ========== main.c ==========\n\
            main.c:2:ERROR: indentation should be tabs\n\
            \n\
            main.c:4:WARNING: trailing whitespace\n\
            done\n";
        let parsed = parse_output(output);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].line, 1);
        assert_eq!(parsed[0].severity, Severity::Error);
        assert_eq!(parsed[1].line, 3);
        assert_eq!(parsed[1].severity, Severity::Warning);
    }

    #[test]
    fn test_missing_tool_signature() {
        assert!(output_reports_missing_tool("sh: 1: betty: not found\n"));
        assert!(!output_reports_missing_tool("main.c:2:ERROR: something\n"));
    }
}
