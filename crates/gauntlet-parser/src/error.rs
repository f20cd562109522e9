//! Parse error types.

use gauntlet_ast::Span;
use gauntlet_lexer::Token;
use std::fmt;

/// Parse error with source location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Kind of parse error
    pub kind: ParseErrorKind,
    /// Byte span in the template string where the error occurred
    pub span: Span,
    /// Human-readable error message
    pub message: String,
}

/// Category of parse error.
///
/// Template-level kinds mirror the classic authoring mistakes (unmatched
/// block markers, nesting); expression-level kinds come from the Pratt
/// parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `{{` with no matching `}}`.
    UnmatchedOpenExpr,
    /// `}}` with no matching `{{`.
    UnmatchedCloseExpr,
    /// `{{` inside an expression block.
    NestedExpr,
    /// `[~` with no terminating separator.
    UnmatchedOpenRepeat,
    /// `[~` inside a repeat section.
    NestedRepeat,
    /// Separator `~...` with no closing `]`.
    UnmatchedSeparator,
    /// A bare `~` outside a repeat section.
    UnescapedTilde,
    /// String ends in an odd number of backslashes.
    TrailingBackslash,
    /// Invalid format spec after `:`.
    BadFormatSpec,

    /// Unexpected token where a specific token was expected.
    UnexpectedToken,
    /// Expression ended while more tokens were expected.
    UnexpectedEof,
    /// Tokens are present but violate the expression grammar.
    InvalidSyntax,
}

impl ParseErrorKind {
    /// Short human label, used as the headline of diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ParseErrorKind::UnmatchedOpenExpr => "unmatched '{{'",
            ParseErrorKind::UnmatchedCloseExpr => "unmatched '}}'",
            ParseErrorKind::NestedExpr => "nested expression",
            ParseErrorKind::UnmatchedOpenRepeat => "unmatched '[~'",
            ParseErrorKind::NestedRepeat => "nested repeat section",
            ParseErrorKind::UnmatchedSeparator => "unmatched '~<sep>]'",
            ParseErrorKind::UnescapedTilde => "unescaped tilde",
            ParseErrorKind::TrailingBackslash => "trailing backslash",
            ParseErrorKind::BadFormatSpec => "invalid format spec",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of expression",
            ParseErrorKind::InvalidSyntax => "invalid syntax",
        }
    }
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Create an "expected token" error.
    pub fn expected_token(expected: &Token, found: Option<&Token>, span: Span) -> Self {
        let (kind, message) = match found {
            Some(token) => (
                ParseErrorKind::UnexpectedToken,
                format!("expected '{}', found '{}'", expected, token),
            ),
            None => (
                ParseErrorKind::UnexpectedEof,
                format!("expected '{}', found end of expression", expected),
            ),
        };
        Self::new(kind, message, span)
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let (kind, message) = match found {
            Some(token) => (
                ParseErrorKind::UnexpectedToken,
                format!("unexpected '{}' {}", token, context),
            ),
            None => (
                ParseErrorKind::UnexpectedEof,
                format!("unexpected end of expression {}", context),
            ),
        };
        Self::new(kind, message, span)
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::InvalidSyntax, message, span)
    }

    /// Shift the error span right by `offset` bytes.
    ///
    /// Expression parsing happens in body-local coordinates; the template
    /// scanner re-anchors errors to the full string with this.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.span = self.span.offset(offset);
        self
    }

    /// Render the full diagnostic against the original string: message,
    /// then the offending line with a caret under the error column.
    pub fn context(&self, source: &str) -> String {
        format!("{}\n{}", self.message, self.span.context(source))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at byte {}: {}",
            self.kind.label(),
            self.span.start,
            self.message
        )
    }
}

impl std::error::Error for ParseError {}
