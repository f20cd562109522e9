//! Atomic expressions - literals, references, calls, lists, parens.

use super::parse_expr;
use crate::error::ParseError;
use crate::stream::TokenStream;
use gauntlet_ast::{Expr, ExprKind, KeySegment, VarKey};
use gauntlet_lexer::Token;

/// Parse an atomic expression.
pub(super) fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let span = stream.current_span();

    match stream.peek() {
        Some(Token::True) => {
            stream.advance();
            Ok(Expr::new(ExprKind::BoolLiteral(true), span))
        }
        Some(Token::False) => {
            stream.advance();
            Ok(Expr::new(ExprKind::BoolLiteral(false), span))
        }
        Some(Token::Integer(n)) => {
            let n = *n;
            stream.advance();
            Ok(Expr::new(ExprKind::IntLiteral(n), span))
        }
        Some(Token::Float(x)) => {
            let x = *x;
            stream.advance();
            Ok(Expr::new(ExprKind::FloatLiteral(x), span))
        }
        Some(Token::String(s)) => {
            let s = s.clone();
            stream.advance();
            Ok(Expr::new(ExprKind::StringLiteral(s), span))
        }
        Some(Token::LBracket) => parse_list(stream),
        Some(Token::LParen) => parse_parenthesized(stream),
        Some(Token::Ident(_)) => parse_reference_or_call(stream),
        other => Err(ParseError::unexpected_token(
            other,
            "in expression",
            span,
        )),
    }
}

/// Parse a list literal: `[expr, expr, ...]`, trailing comma allowed.
fn parse_list(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBracket)?;

    let mut items = Vec::new();
    while !matches!(stream.peek(), Some(Token::RBracket)) {
        items.push(parse_expr(stream)?);

        if matches!(stream.peek(), Some(Token::Comma)) {
            stream.advance();
        } else {
            break;
        }
    }

    stream.expect(Token::RBracket)?;
    Ok(Expr::new(ExprKind::ListLiteral(items), stream.span_from(start)))
}

/// Parse a parenthesized expression.
fn parse_parenthesized(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    stream.expect(Token::LParen)?;
    let inner = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    Ok(inner)
}

/// Parse a variable reference or function call.
///
/// A lone identifier followed by `(` is a function call; otherwise the
/// identifier heads a dotted reference path whose later segments may be
/// identifiers, integer indices, or `*`.
fn parse_reference_or_call(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();
    let head = match stream.advance() {
        Some(Token::Ident(name)) => name.clone(),
        other => {
            return Err(ParseError::unexpected_token(other, "in reference", span));
        }
    };

    if matches!(stream.peek(), Some(Token::LParen)) {
        let args = parse_call_args(stream)?;
        return Ok(Expr::new(
            ExprKind::Call { name: head, args },
            stream.span_from(start),
        ));
    }

    let mut segments = vec![KeySegment::Name(head)];
    while matches!(stream.peek(), Some(Token::Dot)) {
        stream.advance();
        let seg_span = stream.current_span();
        let segment = match stream.advance() {
            Some(Token::Ident(name)) => KeySegment::Name(name.clone()),
            Some(Token::Integer(n)) if *n >= 0 => KeySegment::Index(*n as usize),
            Some(Token::Star) => KeySegment::Wildcard,
            other => {
                return Err(ParseError::unexpected_token(other, "after '.'", seg_span));
            }
        };
        segments.push(segment);
    }

    let key = VarKey::new(segments);
    if key.len() > 4 {
        return Err(ParseError::invalid_syntax(
            format!("invalid variable '{}': too many name parts", key),
            stream.span_from(start),
        ));
    }

    Ok(Expr::new(ExprKind::Var(key), stream.span_from(start)))
}

/// Parse function call arguments.
fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ParseError> {
    stream.expect(Token::LParen)?;

    let mut args = Vec::new();
    while !matches!(stream.peek(), Some(Token::RParen)) {
        args.push(parse_expr(stream)?);

        if !matches!(stream.peek(), Some(Token::RParen)) {
            stream.expect(Token::Comma)?;
        }
    }

    stream.expect(Token::RParen)?;
    Ok(args)
}
