//! Value lists: the storage layer behind every variable.

use crate::error::VariableError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One element of a variable's value list: a scalar string or an ordered
/// mapping of sub-keys to strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarValue {
    Scalar(String),
    Map(IndexMap<String, String>),
}

impl VarValue {
    /// Fetch the value, optionally through a sub-key.
    ///
    /// A scalar answers only the no-subkey form; a mapping *requires* a
    /// sub-key (there is no implicit default key).
    pub fn get(&self, key: &str, subkey: Option<&str>) -> Result<&str, VariableError> {
        match (self, subkey) {
            (VarValue::Scalar(value), None) => Ok(value),
            (VarValue::Scalar(_), Some(subkey)) => Err(VariableError::NotAMapping {
                key: key.to_string(),
                subkey: subkey.to_string(),
            }),
            (VarValue::Map(_), None) => Err(VariableError::SubkeyRequired {
                key: key.to_string(),
            }),
            (VarValue::Map(map), Some(subkey)) => {
                map.get(subkey)
                    .map(String::as_str)
                    .ok_or_else(|| VariableError::UnknownSubkey {
                        key: key.to_string(),
                        subkey: subkey.to_string(),
                    })
            }
        }
    }

    /// Sub-keys of a mapping value, in insertion order. Empty for scalars.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            VarValue::Scalar(_) => Vec::new(),
            VarValue::Map(map) => map.keys().map(String::as_str).collect(),
        }
    }

    fn set(&mut self, subkey: Option<&str>, new_value: String) {
        match (self, subkey) {
            (VarValue::Scalar(value), None) => *value = new_value,
            (VarValue::Map(map), Some(subkey)) => {
                map.insert(subkey.to_string(), new_value);
            }
            // Reference resolution only rewrites locations it read from,
            // so the shapes always line up.
            _ => unreachable!("value shape changed during reference resolution"),
        }
    }
}

/// All values bound to one variable name.
///
/// Always non-empty: an empty list is a build error, not a valid state.
/// Mapping-valued lists must use the same sub-keys in every element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableList {
    values: Vec<VarValue>,
}

impl VariableList {
    /// Build a list, enforcing non-emptiness and consistent sub-keys.
    pub fn new(name: &str, values: Vec<VarValue>) -> Result<Self, VariableError> {
        if values.is_empty() {
            return Err(VariableError::EmptyList(name.to_string()));
        }

        let expected: Vec<&str> = values[0].keys();
        for (index, value) in values.iter().enumerate().skip(1) {
            let found = value.keys();
            if found != expected {
                return Err(VariableError::MismatchedSubkeys {
                    name: name.to_string(),
                    index,
                    found: found.iter().map(|s| s.to_string()).collect(),
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        Ok(Self { values })
    }

    /// A single-scalar list.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            values: vec![VarValue::Scalar(value.into())],
        }
    }

    /// A list of scalar values. Empty input is an error, like any other
    /// empty variable list.
    pub fn scalars<I, S>(values: I) -> Result<Self, VariableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<VarValue> = values
            .into_iter()
            .map(|v| VarValue::Scalar(v.into()))
            .collect();
        Self::new("<anonymous>", values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[VarValue] {
        &self.values
    }

    /// Get the value at `index` (default 0), optionally via sub-key.
    pub fn get(
        &self,
        key: &str,
        index: Option<usize>,
        subkey: Option<&str>,
    ) -> Result<&str, VariableError> {
        let index = index.unwrap_or(0);
        let value = self
            .values
            .get(index)
            .ok_or_else(|| VariableError::IndexOutOfRange {
                key: key.to_string(),
                index,
                len: self.values.len(),
            })?;
        value.get(key, subkey)
    }

    /// All values (through `subkey` if given), in order.
    pub fn get_all(&self, key: &str, subkey: Option<&str>) -> Result<Vec<String>, VariableError> {
        self.values
            .iter()
            .map(|value| value.get(key, subkey).map(str::to_string))
            .collect()
    }

    /// Sub-keys of the mapping values (empty for scalar lists).
    pub fn subkeys(&self) -> Vec<&str> {
        self.values[0].keys()
    }

    /// A new single-element list holding the value at `index`.
    ///
    /// This is the permutation rebinding step.
    pub fn single(&self, index: usize) -> Option<VariableList> {
        self.values.get(index).map(|value| VariableList {
            values: vec![value.clone()],
        })
    }

    /// Overwrite the value at a location (reference resolution only).
    pub(crate) fn set_value(&mut self, index: usize, subkey: Option<&str>, new_value: String) {
        if let Some(value) = self.values.get_mut(index) {
            value.set(subkey, new_value);
        }
    }
}
