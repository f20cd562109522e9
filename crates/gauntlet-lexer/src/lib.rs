// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for gauntlet expression blocks.
//!
//! Tokenizes the text between `{{` and `}}` in a template string using
//! logos. The surrounding template syntax (literal text, repeat sections,
//! format specs) is handled by the template scanner in the parser crate;
//! this lexer only ever sees an expression body.
//!
//! # Design
//!
//! - `Token` — all expression token types (operators, literals, identifiers)
//! - Whitespace is stripped during lexing (not tokens)
//! - `lex()` pairs each token with its byte span for error reporting

use logos::Logos;
use std::ops::Range;

/// Expression token.
///
/// Identifiers are `[a-zA-Z][a-zA-Z0-9_]*`; variable references are parsed
/// from sequences of identifiers, integers, and `*` joined by `.` tokens.
/// `*` doubles as multiplication and the wildcard path segment — the
/// parser decides by context, the same way `<`/`>` are context-dependent
/// in richer grammars.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")] // Skip whitespace
pub enum Token {
    // === Keywords ===
    /// Keyword `and` (logical and)
    #[token("and")]
    And,
    /// Keyword `or` (logical or)
    #[token("or")]
    Or,
    /// Keyword `not` (logical not)
    #[token("not")]
    Not,
    /// Boolean literal `True`
    #[token("True")]
    True,
    /// Boolean literal `False`
    #[token("False")]
    False,

    // === Operators ===
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*` (multiplication, or wildcard in a reference path)
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `//` (floor division)
    #[token("//")]
    SlashSlash,
    /// Operator `%`
    #[token("%")]
    Percent,
    /// Operator `^`
    #[token("^")]
    Caret,
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,

    // === Delimiters ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,
    /// Delimiter `,`
    #[token(",")]
    Comma,
    /// Delimiter `.`
    #[token(".")]
    Dot,

    // === Literals ===
    /// Integer literal.
    ///
    /// Overflow makes logos emit a generic error token; numeric literals
    /// in real configs never get near i64::MAX.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    /// Float literal (e.g. 3.14, 5.67e-8)
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    /// String literal, quotes stripped and escapes applied.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        let content = &s[1..s.len()-1];
        unescape_string(content)
    })]
    String(String),

    /// Identifier (variable name, function name, or sub-key).
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Unescape a string literal body.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(_) => return None, // Unsupported escape sequence
                None => return None,    // Trailing backslash
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::SlashSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::EqEq => write!(f, "=="),
            Token::BangEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(id) => write!(f, "{}", id),
        }
    }
}

/// A lexing failure: an unrecognizable character sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// Byte range of the offending input.
    pub span: Range<usize>,
}

/// Tokenize an expression body, pairing each token with its byte span.
pub fn lex(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(LexError { span }),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
#[allow(clippy::approx_constant)] // Tests lex the literal 3.14, not PI
mod tests {
    use super::*;

    /// Test helper: lex and drop spans.
    fn toks(source: &str) -> Vec<Token> {
        lex(source)
            .expect("lexing failed")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            toks("+ - * / // % ^ == != < <= > >="),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::SlashSlash,
                Token::Percent,
                Token::Caret,
                Token::EqEq,
                Token::BangEq,
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            toks("42 3.14 5.67e-8 1e10"),
            vec![
                Token::Integer(42),
                Token::Float(3.14),
                Token::Float(5.67e-8),
                Token::Float(1e10),
            ]
        );
    }

    #[test]
    fn test_keywords_vs_idents() {
        assert_eq!(
            toks("not nodes and True truthy"),
            vec![
                Token::Not,
                ident("nodes"),
                Token::And,
                Token::True,
                ident("truthy"),
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            toks(r#""hello" "a\"b" "tab\there""#),
            vec![
                Token::String("hello".to_string()),
                Token::String("a\"b".to_string()),
                Token::String("tab\there".to_string()),
            ]
        );
    }

    #[test]
    fn test_dotted_reference() {
        assert_eq!(
            toks("sched.nodes.0"),
            vec![
                ident("sched"),
                Token::Dot,
                ident("nodes"),
                Token::Dot,
                Token::Integer(0),
            ]
        );
    }

    #[test]
    fn test_wildcard_reference() {
        assert_eq!(
            toks("people.*"),
            vec![ident("people"), Token::Dot, Token::Star]
        );
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            toks("len(people.*)"),
            vec![
                ident("len"),
                Token::LParen,
                ident("people"),
                Token::Dot,
                Token::Star,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_lex_error_position() {
        let err = lex("a + @b").unwrap_err();
        assert_eq!(err.span, 4..5);
    }

    #[test]
    fn test_floor_div_not_two_slashes() {
        assert_eq!(toks("7//2"), vec![Token::Integer(7), Token::SlashSlash, Token::Integer(2)]);
    }
}
