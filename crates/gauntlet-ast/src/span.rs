//! Source location tracking for error reporting.
//!
//! Templates are single-line-ish config strings, not source files, so a
//! span is just a byte range into the original template string. The string
//! itself travels with the error (resolution errors always quote the value
//! they failed on), which keeps spans small and self-contained.

use serde::{Deserialize, Serialize};

/// Byte range into a template string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-length span at the given offset.
    pub fn at(offset: u32) -> Self {
        Self::new(offset, offset)
    }

    /// Length of this span in bytes.
    pub fn len(&self) -> u32 {
        debug_assert!(self.end >= self.start, "malformed span");
        self.end.saturating_sub(self.start)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans (returns the span covering both).
    pub fn merge(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift the span right by `offset` bytes.
    ///
    /// Used to re-anchor a span from expression-local coordinates to the
    /// enclosing template string.
    pub fn offset(&self, offset: u32) -> Span {
        Span {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Render a caret context line for this span within `source`.
    ///
    /// Produces the line containing the span start, followed by a caret
    /// marker under the offending column. This is the user-facing format
    /// for all syntax diagnostics, so its shape is part of the contract:
    ///
    /// ```text
    ///     {{ foo + }}
    ///            ^
    /// ```
    pub fn context(&self, source: &str) -> String {
        let start = (self.start as usize).min(source.len());
        let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = source[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(source.len());
        let line = &source[line_start..line_end];
        let column = source[line_start..start].chars().count();

        format!("  {}\n  {}^", line, " ".repeat(column))
    }

    /// Column of the span start within `source` (0-based, in chars).
    pub fn column(&self, source: &str) -> usize {
        let start = (self.start as usize).min(source.len());
        let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        source[line_start..start].chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.merge(b), Span::new(2, 9));
    }

    #[test]
    fn test_context_caret() {
        let src = "{{ foo + }}";
        let span = Span::new(7, 8);
        assert_eq!(span.context(src), "  {{ foo + }}\n         ^");
    }

    #[test]
    fn test_context_second_line() {
        let src = "hello\n{{ bad";
        let span = Span::new(6, 8);
        assert_eq!(span.context(src), "  {{ bad\n  ^");
        assert_eq!(span.column(src), 0);
    }
}
