use serde::Serialize;

/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// All positions handed to the middle-end are byte offsets into the original
/// source string. Line/column information is computed on demand via
/// [`LineIndex`] when a diagnostic is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Where a lowered node came from.
///
/// User-written fragments that survive lowering keep the span they were
/// parsed at. Code that exists only because lowering produced it (tag
/// enumerations, constructors, predicates, scratch bindings) is marked
/// `Synthesized` so that debuggers and diagnostics never point into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourcePos {
    At(Span),
    Synthesized,
}

impl SourcePos {
    /// The source span, or `None` for generated-only code.
    pub fn span(self) -> Option<Span> {
        match self {
            SourcePos::At(span) => Some(span),
            SourcePos::Synthesized => None,
        }
    }

    pub fn is_synthesized(self) -> bool {
        matches!(self, SourcePos::Synthesized)
    }
}

impl From<Span> for SourcePos {
    fn from(span: Span) -> Self {
        SourcePos::At(span)
    }
}

/// Pre-computed index of line start positions for on-demand line/column lookup.
///
/// Constructed once per source file, then used to convert byte offsets to
/// human-readable (line, column) pairs via binary search.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    ///
    /// Column is measured in bytes from the start of the line (1-based).
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        // partition_point returns the index of the first line_start > offset,
        // so the line index is one less than that.
        let line_idx = self.line_starts.partition_point(|&start| start <= offset);
        let line_idx = line_idx.saturating_sub(1);
        let line = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Return the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_and_len() {
        let span = Span::new(5, 10);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn span_merge() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn source_pos_synthesized_has_no_span() {
        assert_eq!(SourcePos::Synthesized.span(), None);
        assert!(SourcePos::Synthesized.is_synthesized());
        let at: SourcePos = Span::new(1, 4).into();
        assert_eq!(at.span(), Some(Span::new(1, 4)));
    }

    #[test]
    fn line_index_multiple_lines() {
        let idx = LineIndex::new("hello\nworld\nfoo");
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(6), (2, 1));
        assert_eq!(idx.line_col(13), (3, 2));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn line_index_newline_at_offset() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_col(2), (1, 3));
        assert_eq!(idx.line_col(3), (2, 1));
    }
}
