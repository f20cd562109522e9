// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! The gauntlet test-configuration resolution engine.
//!
//! Turns raw, inheritance-linked, variable-templated test configs into
//! concrete resolved ones:
//!
//! ```text
//! raw config → inheritance merge → overrides → variable manager assembly
//!   → permutation expansion → per-permutation template resolution
//!   → skip-condition evaluation → resolved configs
//! ```
//!
//! Values that depend on the scheduler allocation (node counts and the
//! like) stay *deferred* through phase 1; the [`phases`] module persists a
//! snapshot of the parsed state, and phase 2 finishes resolution later on
//! the allocated node without re-parsing anything.
//!
//! Every resolution error is a config-authoring bug: deterministic, never
//! retried, and never papered over with a default. The [`resolver`]
//! facade collects failures per test and keeps resolving the rest of the
//! suite.

pub mod conditions;
pub mod config;
pub mod error;
pub mod eval;
pub mod inherit;
pub mod overrides;
pub mod permute;
pub mod phases;
pub mod references;
pub mod resolver;
pub mod strings;

pub use config::{ConfigValue, KeyPath, ResolvedConfig, ResolvedLeaf, ResolvedValue};
pub use error::{ResolveError, TestFailure};
pub use eval::{Eval, EvalError, EvalErrorKind};
pub use permute::PermutationKey;
pub use phases::Snapshot;
pub use resolver::{ResolveReport, Resolver};
pub use strings::StringResult;
