//! Expression trees for `{{ }}` substitution blocks.
//!
//! Expressions are parsed once and evaluated as a pure tree-walk, possibly
//! twice (the second pass happens on the allocated node for values that
//! were deferred at kickoff). The tree is therefore serializable and holds
//! no references into the source string beyond byte spans.

use crate::key::VarKey;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed expression with its source span.
///
/// Spans are byte ranges into the *expression body* (the text between
/// `{{` and `}}`); the parser re-anchors them to the full template string
/// when reporting errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    /// Explicit list literal: `[a, b, c]`.
    ListLiteral(Vec<Expr>),
    /// Variable reference: `category.name.index_or_key.key`.
    Var(VarKey),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Comparison chain: `a < b <= c` evaluates like `a < b and b <= c`.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    /// Function call dispatched to the function registry.
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Unary operators. Both bind tighter than any binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical `not`
    Not,
    /// Arithmetic negation
    Neg,
}

/// Binary operators (comparisons are a separate chain node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `//` — floor division, always an integer result.
    FloorDiv,
    /// `%` — modulus.
    Mod,
    /// `^` — exponentiation, right associative.
    Pow,
    And,
    Or,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "not"),
            UnaryOp::Neg => write!(f, "-"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

impl Expr {
    /// Collect every variable key referenced anywhere in this tree.
    ///
    /// Used by reference resolution (to build the dependency graph between
    /// variables) and by repeat sections (to find which variables to
    /// iterate over).
    pub fn referenced_vars<'a>(&'a self, out: &mut Vec<&'a VarKey>) {
        match &self.kind {
            ExprKind::Var(key) => out.push(key),
            ExprKind::Unary { operand, .. } => operand.referenced_vars(out),
            ExprKind::Binary { left, right, .. } => {
                left.referenced_vars(out);
                right.referenced_vars(out);
            }
            ExprKind::Compare { first, rest } => {
                first.referenced_vars(out);
                for (_, expr) in rest {
                    expr.referenced_vars(out);
                }
            }
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.referenced_vars(out);
                }
            }
            ExprKind::ListLiteral(items) => {
                for item in items {
                    item.referenced_vars(out);
                }
            }
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::StringLiteral(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeySegment;

    fn var(name: &str) -> Expr {
        Expr::new(
            ExprKind::Var(VarKey::new(vec![KeySegment::Name(name.to_string())])),
            Span::new(0, name.len() as u32),
        )
    }

    #[test]
    fn test_referenced_vars_nested() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(var("a")),
                right: Box::new(Expr::new(
                    ExprKind::Call {
                        name: "len".to_string(),
                        args: vec![var("b")],
                    },
                    Span::new(0, 6),
                )),
            },
            Span::new(0, 10),
        );

        let mut vars = Vec::new();
        expr.referenced_vars(&mut vars);
        let names: Vec<String> = vars.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
