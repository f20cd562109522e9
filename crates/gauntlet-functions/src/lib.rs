// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Expression function registry.
//!
//! Functions callable from `{{ }}` expressions — `len`, `floor`, `sum`,
//! and friends — register themselves into a [`linkme::distributed_slice`]
//! at link time. The registry is immutable at runtime: there is no
//! late registration and no monkey-patching, so a resolved config can
//! never depend on registration order.
//!
//! # Registering a function
//!
//! ```ignore
//! use gauntlet_functions::{FunctionDescriptor, Arity, FUNCTIONS};
//! use linkme::distributed_slice;
//!
//! #[distributed_slice(FUNCTIONS)]
//! static DOUBLE: FunctionDescriptor = FunctionDescriptor {
//!     name: "double",
//!     signature: "double(n) -> int",
//!     doc: "Twice the input.",
//!     arity: Arity::Fixed(1),
//!     call: |args| args[0].as_i64().map(|n| (n * 2).into()).ok_or_else(|| {
//!         FunctionError::BadArg { func: "double", message: "expected an int".into() }
//!     }),
//! };
//! ```

pub mod core;

pub use linkme;

use gauntlet_ast::Value;
use linkme::distributed_slice;
use thiserror::Error;

/// Errors from function dispatch and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionError {
    #[error("no such function '{0}'")]
    NoSuchFunction(String),

    #[error("{func}() takes {expected} argument(s), got {got}")]
    WrongArgCount {
        func: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid argument to {func}(): {message}")]
    BadArg { func: &'static str, message: String },
}

/// Signature of a registered function implementation.
pub type FunctionImpl = fn(&[Value]) -> Result<Value, FunctionError>;

/// Arity specification for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

/// Descriptor for a registered expression function.
pub struct FunctionDescriptor {
    /// Name as written in expressions (e.g. "len").
    pub name: &'static str,
    /// Signature string for diagnostics (e.g. "len(list) -> int").
    pub signature: &'static str,
    /// One-line documentation.
    pub doc: &'static str,
    /// Number of arguments.
    pub arity: Arity,
    /// The implementation. Must be pure: resolution runs it once per
    /// permutation and assumes identical results.
    pub call: FunctionImpl,
}

/// Distributed slice collecting all function registrations.
#[distributed_slice]
pub static FUNCTIONS: [FunctionDescriptor];

/// Look up a function by name.
pub fn get(name: &str) -> Option<&'static FunctionDescriptor> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// All registered function names.
pub fn all_names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|f| f.name)
}

/// Dispatch a call: arity check, then the implementation.
pub fn call(name: &str, args: &[Value]) -> Result<Value, FunctionError> {
    let func = get(name).ok_or_else(|| FunctionError::NoSuchFunction(name.to_string()))?;

    if let Arity::Fixed(expected) = func.arity {
        if args.len() != expected {
            return Err(FunctionError::WrongArgCount {
                func: func.name,
                expected,
                got: args.len(),
            });
        }
    }

    (func.call)(args)
}
