//! Line-indexed view over a source buffer.

/// Read-only line access to a document's text.
///
/// Lines are 0-based. A trailing newline in the buffer yields a final
/// empty line, the way editors count lines; the end-of-file fix relies on
/// that distinction. Columns are character offsets, byte offsets only
/// appear in [`Document::offset_at`] results.
#[derive(Debug)]
pub struct Document<'a> {
    source: &'a str,
    /// Byte range of each line, newline excluded.
    lines: Vec<(usize, usize)>,
}

impl<'a> Document<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lines: compute_lines(source),
        }
    }

    /// The full source text.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Number of lines, counting the empty line a trailing newline opens.
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Text of `line` without its newline, or `None` past the end.
    pub fn line_text(&self, line: u32) -> Option<&'a str> {
        let &(start, end) = self.lines.get(line as usize)?;
        let text = &self.source[start..end];
        // A lone trailing \r (no \n) survives line splitting; drop it.
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Byte offset of character column `col` on `line`.
    ///
    /// `col` may equal the line's character length, addressing the end of
    /// the line for insertions. Anything further is `None`.
    pub fn offset_at(&self, line: u32, col: u32) -> Option<usize> {
        let text = self.line_text(line)?;
        let &(start, _) = self.lines.get(line as usize)?;
        let mut remaining = col as usize;
        for (idx, _) in text.char_indices() {
            if remaining == 0 {
                return Some(start + idx);
            }
            remaining -= 1;
        }
        (remaining == 0).then_some(start + text.len())
    }
}

fn compute_lines(source: &str) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut offset = 0usize;

    for line in source.lines() {
        let end = offset + line.len();
        lines.push((offset, end));
        offset = end;
        if offset < source.len() {
            let rest = &source.as_bytes()[offset..];
            offset += if rest.starts_with(b"\r\n") { 2 } else { 1 };
        }
    }

    if source.ends_with('\n') {
        lines.push((source.len(), source.len()));
    }

    lines
}
