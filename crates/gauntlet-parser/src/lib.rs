// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Parsing for gauntlet template strings.
//!
//! Every string value in a test configuration is a template: literal text
//! mixed with `{{ expression }}` blocks and `[~ body ~sep]` repeat
//! sections. This crate turns such a string into a [`Template`] tree,
//! parsing each embedded expression with a Pratt parser over the token
//! stream from `gauntlet-lexer`.
//!
//! Parsing is separate from evaluation: the returned trees are immutable
//! and serializable, and are evaluated (possibly twice, for deferred
//! values) by the resolve crate.
//!
//! # Errors
//!
//! [`ParseError`] carries a byte span into the original string and renders
//! a caret context line, e.g.:
//!
//! ```text
//!   {{ foo + }}
//!          ^
//! ```

mod error;
mod expr;
mod scanner;
mod stream;

pub use error::{ParseError, ParseErrorKind};
pub use stream::TokenStream;

use gauntlet_ast::{Expr, Template};

/// Parse a full template string.
pub fn parse_template(source: &str) -> Result<Template, ParseError> {
    scanner::scan(source)
}

/// Parse a bare expression (the body of a `{{ }}` block).
///
/// Spans in the result are relative to `source`. Used directly by
/// consumers that evaluate expressions outside of template strings, such
/// as result evaluation.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = gauntlet_lexer::lex(source).map_err(|err| {
        ParseError::invalid_syntax(
            "unrecognized character in expression",
            gauntlet_ast::Span::new(err.span.start as u32, err.span.end as u32),
        )
    })?;
    let mut stream = TokenStream::new(&tokens, source.len() as u32);
    let parsed = expr::parse_expr(&mut stream)?;
    stream.expect_end()?;
    Ok(parsed)
}
