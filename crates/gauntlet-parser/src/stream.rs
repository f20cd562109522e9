//! Token stream wrapper for the hand-written expression parser.

use crate::error::ParseError;
use gauntlet_ast::Span;
use gauntlet_lexer::Token;
use std::ops::Range;

/// Token stream with lookahead and position tracking.
///
/// Each token is paired with its byte span in the expression body,
/// enabling accurate error locations. Spans produced here are body-local;
/// the template scanner offsets them into the full string.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    /// Total byte length of the expression body, for EOF spans.
    source_len: u32,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream from tokens with their byte spans.
    pub fn new(tokens: &'src [(Token, Range<usize>)], source_len: u32) -> Self {
        Self {
            tokens,
            pos: 0,
            source_len,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token kind.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let start = self.pos;
            self.advance();
            Ok(self.span_from(start))
        } else {
            Err(ParseError::expected_token(
                &expected,
                self.peek(),
                self.current_span(),
            ))
        }
    }

    /// Error unless the whole stream was consumed.
    pub fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ParseError::unexpected_token(
                Some(token),
                "after expression",
                self.current_span(),
            )),
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Create a span from a starting token position to the last consumed
    /// token, in byte offsets.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .map(|(_, span)| span.start as u32)
            .unwrap_or(self.source_len);

        let end_byte = if self.pos > 0 && self.pos <= self.tokens.len() {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, span)| span.end as u32)
                .unwrap_or(self.source_len)
        } else {
            start_byte
        };

        Span::new(start_byte, end_byte.max(start_byte))
    }

    /// Get a span for the current token (or EOF).
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => Span::new(span.start as u32, span.end as u32),
            None => match self.tokens.last() {
                // At EOF - point just past the last token.
                Some((_, span)) => Span::at(span.end as u32),
                None => Span::at(0),
            },
        }
    }
}
