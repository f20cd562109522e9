// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST and value types for gauntlet's template language.
//!
//! A test configuration value is a *template*: literal text mixed with
//! `{{ expression }}` substitution blocks and `[~ body ~sep]` repeat
//! sections. This crate defines the parsed representation of templates and
//! expressions, the runtime [`Value`] type expressions evaluate to, and the
//! dotted [`VarKey`] paths used to reference variables.
//!
//! Everything here is immutable once built and serializable: a template is
//! parsed exactly once, and the same tree is re-evaluated later on an
//! allocated node to fill in values that were unknown at kickoff time.

pub mod expr;
pub mod key;
pub mod span;
pub mod template;
pub mod value;

pub use expr::{BinaryOp, CompareOp, Expr, ExprKind, UnaryOp};
pub use key::{KeyError, KeySegment, VarKey};
pub use span::Span;
pub use template::{ExprBlock, FormatError, FormatSpec, RepeatBlock, Template, TemplateItem};
pub use value::Value;
