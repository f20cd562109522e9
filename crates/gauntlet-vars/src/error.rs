//! Variable lookup and construction errors.

use crate::set::SetName;
use gauntlet_ast::KeyError;
use thiserror::Error;

/// Errors from building variable sets or resolving keys against them.
///
/// All of these are config authoring mistakes: deterministic, not retried,
/// and surfaced with the full dotted key that triggered them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariableError {
    #[error("could not find a variable named '{0}' in any variable set")]
    NotFound(String),

    #[error("variable set '{set}' does not contain a variable named '{name}'; available: {available:?}")]
    NotInSet {
        set: SetName,
        name: String,
        available: Vec<String>,
    },

    #[error("index {index} out of range for '{key}': there are only {len} values")]
    IndexOutOfRange {
        key: String,
        index: usize,
        len: usize,
    },

    #[error("variable '{key}' has sub-values; one must be requested explicitly")]
    SubkeyRequired { key: String },

    #[error("unknown sub-key '{subkey}' for variable '{key}'")]
    UnknownSubkey { key: String, subkey: String },

    #[error("variable '{key}' is a simple value with no sub-key '{subkey}'")]
    NotAMapping { key: String, subkey: String },

    #[error("invalid variable name '{0}': names must match [a-z][a-z0-9_-]*")]
    InvalidName(String),

    #[error("invalid reference '{0}': the category must come first")]
    MisplacedCategory(String),

    #[error("invalid reference '{0}': {1}")]
    BadReference(String, String),

    #[error("variable '{0}' has no values; a variable must have at least one")]
    EmptyList(String),

    #[error(
        "sub-keys do not match across values of '{name}': \
         index {index} has keys {found:?}, but expected {expected:?}"
    )]
    MismatchedSubkeys {
        name: String,
        index: usize,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("variable set '{0}' was already added")]
    DuplicateSet(SetName),

    #[error("tried to use deferred variable '{0}' before allocation")]
    Deferred(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}
