//! Resolution error taxonomy.
//!
//! Everything here represents a config authoring bug: deterministic, not
//! retried, and never silently defaulted. Errors surfaced to the user
//! carry the suite path, test name, dotted key path, and the original
//! unresolved string; syntax and evaluation errors additionally render a
//! caret marker into that string.

use gauntlet_parser::ParseError;
use gauntlet_vars::VariableError;
use std::fmt;
use thiserror::Error;

use crate::eval::EvalError;

/// A resolution failure within one test (or one permutation of it).
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Malformed template or expression syntax.
    Syntax {
        key_path: String,
        raw: String,
        err: ParseError,
    },

    /// Evaluation failed (bad variable, type mismatch, bad function call).
    Eval {
        key_path: String,
        raw: String,
        err: EvalError,
    },

    /// A deferred value landed in a section that must resolve before
    /// allocation.
    DeferredForbidden {
        key_path: String,
        raw: String,
        var: String,
    },

    /// Variables reference each other in a loop.
    Cycle { vars: Vec<String> },

    /// Bad `permute_on` entry (missing, indexed, deferred, or empty).
    Permutation(String),

    /// Bad inheritance chain (missing parent or cycle).
    Inheritance { suite_path: String, message: String },

    /// Malformed or forbidden CLI override.
    Override {
        override_str: String,
        message: String,
    },

    /// Variable lookup error outside expression evaluation (e.g. a bad
    /// `permute_on` reference).
    Variable(VariableError),

    /// Phase 2 found a leaf it could not make concrete. This indicates the
    /// allocation-time variable set was incomplete, not a config bug.
    StillDeferred { key_path: String },

    /// Phase 2 was started with a variable manager that still carries
    /// deferred variables.
    IncompleteUndefer { vars: Vec<String> },

    /// Snapshot (de)serialization failure between phases.
    Snapshot { action: &'static str, message: String },

    /// The raw config had a non-string leaf or other impossible shape.
    BadStructure { key_path: String, message: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Syntax { key_path, raw, err } => {
                write!(
                    f,
                    "syntax error in value '{}' at key '{}':\n{}",
                    raw,
                    key_path,
                    err.context(raw)
                )
            }
            ResolveError::Eval { key_path, raw, err } => {
                write!(
                    f,
                    "failed to resolve '{}' at key '{}':\n{}",
                    raw,
                    key_path,
                    err.context(raw)
                )
            }
            ResolveError::DeferredForbidden { key_path, raw, var } => {
                write!(
                    f,
                    "deferred variable '{}' in value '{}' under key '{}', \
                     where deferred values aren't allowed",
                    var, raw, key_path
                )
            }
            ResolveError::Cycle { vars } => {
                write!(f, "variables {:?} contain a reference loop", vars)
            }
            ResolveError::Permutation(message) => write!(f, "permutation error: {}", message),
            ResolveError::Inheritance { suite_path, message } => {
                write!(f, "inheritance error in suite '{}': {}", suite_path, message)
            }
            ResolveError::Override {
                override_str,
                message,
            } => write!(f, "invalid override '{}': {}", override_str, message),
            ResolveError::Variable(err) => write!(f, "{}", err),
            ResolveError::StillDeferred { key_path } => {
                write!(f, "value at '{}' was still deferred after allocation", key_path)
            }
            ResolveError::IncompleteUndefer { vars } => {
                write!(
                    f,
                    "the variable manager must be fully concrete for the second \
                     resolution pass, but still defers: {:?}",
                    vars
                )
            }
            ResolveError::Snapshot { action, message } => {
                write!(f, "could not {} resolution snapshot: {}", action, message)
            }
            ResolveError::BadStructure { key_path, message } => {
                write!(f, "invalid config structure at '{}': {}", key_path, message)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<VariableError> for ResolveError {
    fn from(err: VariableError) -> Self {
        ResolveError::Variable(err)
    }
}

/// A per-test failure in an aggregate report.
///
/// The facade resolves every test in a suite even when some fail; each
/// failure is recorded with enough context to locate the offending config.
#[derive(Debug, Clone, Error)]
#[error("in test '{test}' from {suite_path}: {error}")]
pub struct TestFailure {
    pub suite_path: String,
    pub test: String,
    #[source]
    pub error: ResolveError,
}
