// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Variable stores for gauntlet test configurations.
//!
//! Every variable has three layers: a list of values, an optional mapping
//! of sub-keys per value, and the sub-key values themselves. From the
//! config author's perspective all but the value are optional — a plain
//! `nodes: "4"` is a one-element list holding a scalar.
//!
//! Variables come from four sources, each its own [`VariableSet`]:
//! test-config `var`s, system plugins (`sys`), framework-provided (`pav`),
//! and scheduler-provided (`sched`). A [`VariableSetManager`] composes the
//! four with a fixed precedence for unqualified lookups and tracks which
//! values are *deferred* — unknowable until a scheduler allocation exists.
//!
//! Everything is immutable after construction except two well-defined
//! steps: reference resolution rewriting `var` values in place, and the
//! permutation engine rebinding a permuted variable to a single value.

pub mod error;
pub mod list;
pub mod manager;
pub mod set;
pub mod source;

pub use error::VariableError;
pub use list::{VarValue, VariableList};
pub use manager::{
    DeferredKey, DeferredTag, ResolvedKey, VarIndex, VarLookup, VariableSetManager,
};
pub use set::{SetName, VarEntry, VariableSet};
pub use source::{MemoizedSource, SourceValue, VariableSource};
