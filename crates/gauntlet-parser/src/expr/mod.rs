//! Expression parser using Pratt parsing (precedence climbing).
//!
//! ## Precedence levels (lowest to highest)
//!
//! 1. `or` - left associative
//! 2. `and` - left associative
//! 3. `==`, `!=`, `<`, `<=`, `>`, `>=` - chained (`a < b < c` means
//!    `a < b and b < c`)
//! 4. `+`, `-` - left associative
//! 5. `*`, `/`, `//`, `%` - left associative
//! 6. `^` - right associative
//! 7. Unary `-`, `not` - prefix, bind tighter than all binary operators
//!
//! ## Module organization
//!
//! - `pratt` - Pratt parser core (precedence climbing, binary/unary ops,
//!   comparison chains)
//! - `atoms` - Atomic expressions (literals, references, calls, lists,
//!   parenthesized)

mod atoms;
mod pratt;

use crate::error::ParseError;
use crate::stream::TokenStream;
use gauntlet_ast::Expr;

/// Parse an expression.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    pratt::parse_pratt(stream, 0)
}
