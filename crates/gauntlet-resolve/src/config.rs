//! The configuration tree, before and after resolution.
//!
//! A raw config is a nested string-keyed mapping whose leaves are all
//! strings (the external loader guarantees this shape). Resolution
//! preserves the shape and replaces each leaf with either its resolved
//! string or a deferred marker carrying the parsed template for phase 2.

use gauntlet_ast::Template;
use gauntlet_vars::VariableSetManager;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::permute::PermutationKey;

/// A raw configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Str(String),
    List(Vec<ConfigValue>),
    Map(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    /// An empty mapping.
    pub fn map() -> Self {
        ConfigValue::Map(IndexMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Fetch a top-level key of a mapping value.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// The strings of a list-of-strings key (e.g. `permute_on`).
    pub fn string_list(&self) -> Option<Vec<&str>> {
        match self {
            ConfigValue::List(items) => items.iter().map(ConfigValue::as_str).collect(),
            ConfigValue::Str(s) => Some(vec![s.as_str()]),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Str(s)
    }
}

/// One step of a dotted config key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPart {
    Key(String),
    Index(usize),
}

/// A dotted path into the config tree, e.g. `run.cmds.0`.
///
/// Every surfaced resolution error carries one of these; its `Display`
/// form is part of the user-facing contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPath {
    parts: Vec<KeyPart>,
}

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, name: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(KeyPart::Key(name.to_string()));
        Self { parts }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut parts = self.parts.clone();
        parts.push(KeyPart::Index(index));
        Self { parts }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.parts {
            if !first {
                write!(f, ".")?;
            }
            match part {
                KeyPart::Key(key) => write!(f, "{}", key)?,
                KeyPart::Index(index) => write!(f, "{}", index)?,
            }
            first = false;
        }
        Ok(())
    }
}

/// A resolved leaf: a plain string, or a deferred marker holding the
/// parsed template so phase 2 never re-parses source strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedLeaf {
    Resolved(String),
    Deferred { raw: String, template: Template },
}

impl ResolvedLeaf {
    pub fn is_deferred(&self) -> bool {
        matches!(self, ResolvedLeaf::Deferred { .. })
    }

    /// The resolved string, if phase 1 produced one.
    pub fn as_resolved(&self) -> Option<&str> {
        match self {
            ResolvedLeaf::Resolved(s) => Some(s),
            ResolvedLeaf::Deferred { .. } => None,
        }
    }
}

/// A resolved configuration tree: the raw shape with resolved leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Leaf(ResolvedLeaf),
    List(Vec<ResolvedValue>),
    Map(IndexMap<String, ResolvedValue>),
}

impl ResolvedValue {
    pub fn as_map(&self) -> Option<&IndexMap<String, ResolvedValue>> {
        match self {
            ResolvedValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// The leaf string at a resolved leaf, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResolvedValue::Leaf(leaf) => leaf.as_resolved(),
            _ => None,
        }
    }

    /// Whether any leaf under this value is still deferred.
    pub fn any_deferred(&self) -> bool {
        match self {
            ResolvedValue::Leaf(leaf) => leaf.is_deferred(),
            ResolvedValue::List(items) => items.iter().any(ResolvedValue::any_deferred),
            ResolvedValue::Map(map) => map.values().any(ResolvedValue::any_deferred),
        }
    }
}

/// The output artifact: one fully resolved test instance.
///
/// Downstream script writers get both the resolved tree and the variable
/// manager that produced it (they need direct variable access), plus the
/// permutation key that distinguishes this instance from its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Test name within its suite.
    pub name: String,
    /// Path of the suite file this test came from.
    pub suite_path: String,
    /// Resolved configuration tree.
    pub values: ResolvedValue,
    /// Which permutation this instance is.
    pub permutation: PermutationKey,
    /// The variable namespace used to resolve it.
    pub var_man: VariableSetManager,
    /// Hidden tests are inheritable but excluded from whole-suite runs.
    pub hidden: bool,
    /// Set when a skip condition matched, with the reason.
    pub skipped: Option<String>,
}
