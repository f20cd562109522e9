//! Variable categories and per-category sets.

use crate::error::VariableError;
use crate::list::{VarValue, VariableList};
use crate::source::{SourceValue, VariableSource};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four variable categories, in unqualified-resolution order.
///
/// An unqualified name checks the categories in this order and the first
/// set containing the name wins, so a test-level `var` always shadows a
/// same-named system or scheduler variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetName {
    Var,
    Sys,
    Pav,
    Sched,
}

impl SetName {
    /// Resolution order for unqualified lookups.
    pub const RESOLUTION_ORDER: [SetName; 4] =
        [SetName::Var, SetName::Sys, SetName::Pav, SetName::Sched];

    pub fn as_str(&self) -> &'static str {
        match self {
            SetName::Var => "var",
            SetName::Sys => "sys",
            SetName::Pav => "pav",
            SetName::Sched => "sched",
        }
    }

    /// Parse a category prefix. Returns None for non-category names.
    pub fn from_prefix(s: &str) -> Option<SetName> {
        match s {
            "var" => Some(SetName::Var),
            "sys" => Some(SetName::Sys),
            "pav" => Some(SetName::Pav),
            "sched" => Some(SetName::Sched),
            _ => None,
        }
    }
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A variable entry: concrete values, or a whole-variable deferral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarEntry {
    Values(VariableList),
    /// The source could not answer before allocation (e.g. `sched.nodes`).
    Deferred,
}

/// One category's variables: an insertion-ordered name → list mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSet {
    name: SetName,
    vars: IndexMap<String, VarEntry>,
}

/// Check a variable definition name.
///
/// Definition names are stricter than expression identifiers: lowercase,
/// letter first, then letters/digits/underscore/hyphen.
fn validate_name(name: &str) -> Result<(), VariableError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(VariableError::InvalidName(name.to_string()))
    }
}

impl VariableSet {
    pub fn new(name: SetName) -> Self {
        Self {
            name,
            vars: IndexMap::new(),
        }
    }

    /// Build a set by querying a [`VariableSource`] for every name it
    /// advertises. With `defer_unready`, names the source cannot answer
    /// yet become whole-variable deferrals instead of errors.
    pub fn from_source(
        name: SetName,
        source: &dyn VariableSource,
        defer_unready: bool,
    ) -> Result<Self, VariableError> {
        let mut set = Self::new(name);
        for var_name in source.names() {
            match source.get(&var_name) {
                Some(SourceValue::Ready(values)) => {
                    let list = VariableList::new(&var_name, values)?;
                    set.insert(var_name, list)?;
                }
                Some(SourceValue::Deferred) => {
                    if defer_unready {
                        validate_name(&var_name)?;
                        set.vars.insert(var_name, VarEntry::Deferred);
                    } else {
                        return Err(VariableError::Deferred(format!(
                            "{}.{}",
                            name, var_name
                        )));
                    }
                }
                None => {}
            }
        }
        Ok(set)
    }

    pub fn name(&self) -> SetName {
        self.name
    }

    /// Insert a variable. Names are validated here so every set entry is
    /// known-good downstream.
    pub fn insert(&mut self, name: impl Into<String>, list: VariableList) -> Result<(), VariableError> {
        let name = name.into();
        validate_name(&name)?;
        self.vars.insert(name, VarEntry::Values(list));
        Ok(())
    }

    /// Insert a single scalar value (convenience).
    pub fn insert_scalar(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), VariableError> {
        self.insert(name, VariableList::scalar(value))
    }

    /// Mark a variable as wholly deferred.
    pub fn insert_deferred(&mut self, name: impl Into<String>) -> Result<(), VariableError> {
        let name = name.into();
        validate_name(&name)?;
        self.vars.insert(name, VarEntry::Deferred);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&VarEntry> {
        self.vars.get(name)
    }

    /// The concrete list for `name`, or an error naming the set and the
    /// available variables.
    pub fn list(&self, name: &str) -> Result<&VariableList, VariableError> {
        match self.vars.get(name) {
            Some(VarEntry::Values(list)) => Ok(list),
            Some(VarEntry::Deferred) => Err(VariableError::Deferred(format!(
                "{}.{}",
                self.name, name
            ))),
            None => Err(VariableError::NotInSet {
                set: self.name,
                name: name.to_string(),
                available: self.vars.keys().cloned().collect(),
            }),
        }
    }

    /// Variable names in insertion order.
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Names of wholly deferred variables.
    pub fn deferred_names(&self) -> impl Iterator<Item = &str> {
        self.vars
            .iter()
            .filter(|(_, entry)| matches!(entry, VarEntry::Deferred))
            .map(|(name, _)| name.as_str())
    }

    /// Replace a variable's entry outright (permutation rebinding and
    /// phase-2 undeferral).
    pub(crate) fn replace(&mut self, name: &str, entry: VarEntry) {
        self.vars.insert(name.to_string(), entry);
    }

    pub(crate) fn set_value(
        &mut self,
        name: &str,
        index: usize,
        subkey: Option<&str>,
        value: String,
    ) {
        if let Some(VarEntry::Values(list)) = self.vars.get_mut(name) {
            list.set_value(index, subkey, value);
        }
    }
}
