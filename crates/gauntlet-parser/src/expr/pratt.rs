//! Pratt parser core - precedence climbing for binary and unary operators.

use super::atoms;
use crate::error::ParseError;
use crate::stream::TokenStream;
use gauntlet_ast::{BinaryOp, CompareOp, Expr, ExprKind, UnaryOp};
use gauntlet_lexer::Token;

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Precedence of the comparison level; comparisons chain rather than nest.
const COMPARE_PREC: u8 = 30;

/// Get binary operator metadata (precedence, associativity, operator).
///
/// Higher precedence = tighter binding. This is the single source of truth
/// for binary operator parsing.
fn binary_op_info(token: &Token) -> Option<(u8, Assoc, BinaryOp)> {
    match token {
        Token::Or => Some((10, Assoc::Left, BinaryOp::Or)),
        Token::And => Some((20, Assoc::Left, BinaryOp::And)),
        Token::Plus => Some((40, Assoc::Left, BinaryOp::Add)),
        Token::Minus => Some((40, Assoc::Left, BinaryOp::Sub)),
        Token::Star => Some((50, Assoc::Left, BinaryOp::Mul)),
        Token::Slash => Some((50, Assoc::Left, BinaryOp::Div)),
        Token::SlashSlash => Some((50, Assoc::Left, BinaryOp::FloorDiv)),
        Token::Percent => Some((50, Assoc::Left, BinaryOp::Mod)),
        Token::Caret => Some((60, Assoc::Right, BinaryOp::Pow)),
        _ => None,
    }
}

/// Comparison operator lookup. Separate from [`binary_op_info`] because
/// comparisons build a chain node, not a binary tree.
fn compare_op(token: &Token) -> Option<CompareOp> {
    match token {
        Token::EqEq => Some(CompareOp::Eq),
        Token::BangEq => Some(CompareOp::Ne),
        Token::Lt => Some(CompareOp::Lt),
        Token::LtEq => Some(CompareOp::Le),
        Token::Gt => Some(CompareOp::Gt),
        Token::GtEq => Some(CompareOp::Ge),
        _ => None,
    }
}

/// Pratt parser - handles binary operators with precedence climbing.
pub(super) fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let mut left = parse_prefix(stream)?;

    // Whether `left` is a comparison chain built in THIS loop. A
    // parenthesized comparison is an ordinary operand and must not be
    // extended into a chain.
    let mut in_chain = false;

    while let Some(token) = stream.peek() {
        if let Some(cmp) = compare_op(token) {
            if COMPARE_PREC < min_prec {
                break;
            }
            stream.advance();
            let right = parse_pratt(stream, COMPARE_PREC + 1)?;
            let span = left.span.merge(right.span);

            if in_chain {
                if let ExprKind::Compare { rest, .. } = &mut left.kind {
                    rest.push((cmp, right));
                    left.span = span;
                    continue;
                }
            }
            left = Expr::new(
                ExprKind::Compare {
                    first: Box::new(left),
                    rest: vec![(cmp, right)],
                },
                span,
            );
            in_chain = true;
            continue;
        }

        if let Some((prec, assoc, op)) = binary_op_info(token) {
            if prec < min_prec {
                break;
            }
            stream.advance();

            let next_prec = if assoc == Assoc::Left { prec + 1 } else { prec };
            let right = parse_pratt(stream, next_prec)?;

            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
            in_chain = false;
        } else {
            break;
        }
    }

    Ok(left)
}

/// Parse prefix expressions (unary operators, then atoms).
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    match stream.peek() {
        Some(Token::Minus) | Some(Token::Not) | Some(Token::Plus) => parse_unary(stream),
        _ => atoms::parse_atom(stream),
    }
}

/// Parse unary operators.
///
/// Unary `+` is accepted and discarded (`+5` is `5`), matching the
/// sign-prefix rule of the config language.
fn parse_unary(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let span = stream.current_span();
    let op = match stream.advance() {
        Some(Token::Minus) => Some(UnaryOp::Neg),
        Some(Token::Not) => Some(UnaryOp::Not),
        Some(Token::Plus) => None,
        other => {
            return Err(ParseError::unexpected_token(other, "unary operator", span));
        }
    };

    let operand = parse_prefix(stream)?;
    let full_span = span.merge(operand.span);

    Ok(match op {
        Some(op) => Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            full_span,
        ),
        None => operand,
    })
}
