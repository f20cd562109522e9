//! The permutation engine.
//!
//! `permute_on` multiplies one test config into the cross product of the
//! named variables' values. Each resulting instance carries a manager in
//! which every permuted name is rebound to a single value, plus a
//! [`PermutationKey`] identifying its point in the product.

use crate::config::ConfigValue;
use crate::error::ResolveError;
use gauntlet_ast::VarKey;
use gauntlet_vars::{SetName, VariableSetManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One point in the permutation cross product: the chosen index for each
/// permuted variable, in `permute_on` order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermutationKey {
    pub choices: Vec<(SetName, String, usize)>,
}

impl PermutationKey {
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

impl fmt::Display for PermutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (set, name, index) in &self.choices {
            if !first {
                write!(f, "-")?;
            }
            write!(f, "{}.{}.{}", set, name, index)?;
            first = false;
        }
        Ok(())
    }
}

/// Expand a config into its permutations.
///
/// Validates `permute_on` (bare names only, defined, not deferred),
/// synthesizes a default `subtitle` when the config has none, and returns
/// the possibly-updated config plus one (key, manager) pair per
/// permutation. With no `permute_on` there is exactly one pair.
pub fn resolve_permutations(
    config: &ConfigValue,
    base_var_man: &VariableSetManager,
) -> Result<(ConfigValue, Vec<(PermutationKey, VariableSetManager)>), ResolveError> {
    let permute_on: Vec<String> = match config.get("permute_on") {
        Some(value) => value
            .string_list()
            .ok_or_else(|| {
                ResolveError::Permutation(
                    "'permute_on' must be a list of variable names".to_string(),
                )
            })?
            .into_iter()
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    let mut used: Vec<(SetName, String)> = Vec::new();
    for per_var in &permute_on {
        let key = VarKey::parse(per_var).map_err(|err| {
            ResolveError::Permutation(format!("bad permutation variable '{}': {}", per_var, err))
        })?;
        let resolved = base_var_man.resolve_key(&key).map_err(|_| {
            ResolveError::Permutation(format!(
                "permutation variable '{}' is not defined",
                per_var
            ))
        })?;

        if resolved.index.is_some() || resolved.subkey.is_some() {
            return Err(ResolveError::Permutation(format!(
                "permutation variable '{}' contains an index or sub-key",
                per_var
            )));
        }

        if base_var_man.any_deferred(resolved.set, &resolved.name) {
            return Err(ResolveError::Permutation(format!(
                "permutation variable '{}' references a deferred variable \
                 or one with deferred components",
                per_var
            )));
        }

        if !used.iter().any(|(s, n)| (*s, n.as_str()) == (resolved.set, resolved.name.as_str())) {
            used.push((resolved.set, resolved.name));
        }
    }

    // Synthesize a subtitle so permuted instances are distinguishable:
    // mapping-valued variables contribute their name, scalars their value.
    let mut config = config.clone();
    if !used.is_empty() && config.get("subtitle").is_none() {
        let mut parts = Vec::new();
        for (set, name) in &used {
            let keys = base_var_man.keys(*set, name)?;
            if keys.is_empty() {
                parts.push(format!("{{{{{}}}}}", name));
            } else {
                parts.push(format!("_{}_", name));
            }
        }
        if let Some(map) = config.as_map_mut() {
            map.insert(
                "subtitle".to_string(),
                ConfigValue::Str(parts.join("-")),
            );
        }
    }

    let permutations = base_var_man
        .get_permutations(&used)
        .map_err(|err| ResolveError::Permutation(err.to_string()))?;

    debug!(count = permutations.len(), "expanded permutations");

    let pairs = permutations
        .into_iter()
        .map(|(choices, var_man)| (PermutationKey { choices }, var_man))
        .collect();

    Ok((config, pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_vars::{VarValue, VariableList, VariableSet};
    use indexmap::IndexMap;

    fn cfg(json: &str) -> ConfigValue {
        serde_json::from_str(json).unwrap()
    }

    fn var_man() -> VariableSetManager {
        let mut var = VariableSet::new(SetName::Var);
        var.insert("compiler", VariableList::scalars(["gcc", "icc", "clang"]).unwrap())
            .unwrap();
        var.insert("size", VariableList::scalars(["small", "large"]).unwrap())
            .unwrap();
        let mpis: Vec<VarValue> = ["openmpi", "mvapich"]
            .iter()
            .map(|name| {
                let mut map = IndexMap::new();
                map.insert("name".to_string(), name.to_string());
                map.insert("module".to_string(), format!("{}/4.0", name));
                VarValue::Map(map)
            })
            .collect();
        var.insert("mpi", VariableList::new("mpi", mpis).unwrap())
            .unwrap();

        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_deferred("nodes").unwrap();

        let mut man = VariableSetManager::new();
        man.add_var_set(var).unwrap();
        man.add_var_set(sched).unwrap();
        man
    }

    #[test]
    fn test_cardinality() {
        let config = cfg(r#"{"permute_on": ["compiler", "size"]}"#);
        let (_, pairs) = resolve_permutations(&config, &var_man()).unwrap();
        assert_eq!(pairs.len(), 6);
        for (key, man) in &pairs {
            assert_eq!(key.choices.len(), 2);
            assert_eq!(man.len(SetName::Var, "compiler").unwrap(), 1);
            assert_eq!(man.len(SetName::Var, "size").unwrap(), 1);
        }
    }

    #[test]
    fn test_no_permute_on() {
        let config = cfg(r#"{"summary": "plain"}"#);
        let (_, pairs) = resolve_permutations(&config, &var_man()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.is_empty());
    }

    #[test]
    fn test_deferred_permute_is_fatal() {
        let config = cfg(r#"{"permute_on": ["nodes"]}"#);
        let err = resolve_permutations(&config, &var_man()).unwrap_err();
        assert!(matches!(err, ResolveError::Permutation(_)));
    }

    #[test]
    fn test_indexed_permute_is_fatal() {
        let config = cfg(r#"{"permute_on": ["compiler.0"]}"#);
        assert!(resolve_permutations(&config, &var_man()).is_err());
    }

    #[test]
    fn test_undefined_permute_is_fatal() {
        let config = cfg(r#"{"permute_on": ["missing"]}"#);
        assert!(resolve_permutations(&config, &var_man()).is_err());
    }

    #[test]
    fn test_subtitle_synthesized() {
        let config = cfg(r#"{"permute_on": ["compiler", "mpi"]}"#);
        let (config, _) = resolve_permutations(&config, &var_man()).unwrap();
        assert_eq!(
            config.get("subtitle").and_then(ConfigValue::as_str),
            Some("{{compiler}}-_mpi_")
        );
    }

    #[test]
    fn test_explicit_subtitle_kept() {
        let config = cfg(r#"{"permute_on": ["compiler"], "subtitle": "mine"}"#);
        let (config, _) = resolve_permutations(&config, &var_man()).unwrap();
        assert_eq!(config.get("subtitle").and_then(ConfigValue::as_str), Some("mine"));
    }
}
