//! The two-phase deferred value protocol.
//!
//! Phase 1 (kickoff) resolves every string in the config tree. Values
//! that touch deferred variables are legal only in allocation-dependent
//! sections; elsewhere they fail immediately. Phase 2 runs later, in a
//! different process on the allocated node: it loads the phase-1
//! [`Snapshot`] (parsed templates + leaf states, never source strings),
//! swaps concrete values into the manager, and re-evaluates only the
//! leaves still deferred. Resolved leaves are never re-evaluated, so
//! literal braces produced by phase 1 are never re-interpreted.

use crate::config::{ConfigValue, KeyPath, ResolvedLeaf, ResolvedValue};
use crate::error::ResolveError;
use crate::strings::{resolve_template, StringResult};
use gauntlet_parser::parse_template;
use gauntlet_vars::{ResolvedKey, VarIndex, VariableSetManager};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level sections where deferred values may legally remain after
/// phase 1. Everything else — build, scheduler parameters, skip
/// conditions, root-level scalars — must be concrete at kickoff.
const DEFERRED_ALLOWED: &[&str] = &[
    "run",
    "env",
    "results",
    "result_parse",
    "result_evaluate",
    // The raw variables section may reference deferred variables; the
    // manager tracks those as fine-grained deferrals.
    "variables",
];

/// Sections whose mapping *keys* are themselves templates.
const KEYED_CONDITION_SECTIONS: &[&str] = &["only_if", "not_if"];

/// Phase 1: resolve every string in the config tree.
pub fn resolve_test_vars(
    config: &ConfigValue,
    var_man: &VariableSetManager,
) -> Result<ResolvedValue, ResolveError> {
    let map = config.as_map().ok_or_else(|| ResolveError::BadStructure {
        key_path: String::new(),
        message: "a test config must be a mapping".to_string(),
    })?;

    let mut out = IndexMap::new();
    for (key, value) in map {
        let path = KeyPath::root().key(key);
        let resolved = if KEYED_CONDITION_SECTIONS.contains(&key.as_str()) {
            resolve_condition_map(value, var_man, &path)?
        } else {
            let allow = DEFERRED_ALLOWED.contains(&key.as_str());
            resolve_section(value, var_man, allow, &path)?
        };
        out.insert(key.clone(), resolved);
    }

    Ok(ResolvedValue::Map(out))
}

fn resolve_section(
    value: &ConfigValue,
    var_man: &VariableSetManager,
    allow_deferred: bool,
    path: &KeyPath,
) -> Result<ResolvedValue, ResolveError> {
    match value {
        ConfigValue::Str(raw) => {
            resolve_string(raw, var_man, allow_deferred, path).map(ResolvedValue::Leaf)
        }
        ConfigValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                out.push(resolve_section(
                    item,
                    var_man,
                    allow_deferred,
                    &path.index(index),
                )?);
            }
            Ok(ResolvedValue::List(out))
        }
        ConfigValue::Map(map) => {
            let mut out = IndexMap::new();
            for (key, item) in map {
                out.insert(
                    key.clone(),
                    resolve_section(item, var_man, allow_deferred, &path.key(key))?,
                );
            }
            Ok(ResolvedValue::Map(out))
        }
    }
}

fn resolve_string(
    raw: &str,
    var_man: &VariableSetManager,
    allow_deferred: bool,
    path: &KeyPath,
) -> Result<ResolvedLeaf, ResolveError> {
    let template = parse_template(raw).map_err(|err| ResolveError::Syntax {
        key_path: path.to_string(),
        raw: raw.to_string(),
        err,
    })?;

    match resolve_template(&template, var_man) {
        Ok(StringResult::Resolved(value)) => Ok(ResolvedLeaf::Resolved(value)),
        Ok(StringResult::Deferred(tag)) => {
            if allow_deferred {
                Ok(ResolvedLeaf::Deferred {
                    raw: raw.to_string(),
                    template,
                })
            } else {
                Err(ResolveError::DeferredForbidden {
                    key_path: path.to_string(),
                    raw: raw.to_string(),
                    var: tag.to_string(),
                })
            }
        }
        Err(err) => Err(ResolveError::Eval {
            key_path: path.to_string(),
            raw: raw.to_string(),
            err,
        }),
    }
}

/// Resolve a skip-condition mapping: both keys and values are templates,
/// and neither may be deferred (the skip decision happens at kickoff).
fn resolve_condition_map(
    value: &ConfigValue,
    var_man: &VariableSetManager,
    path: &KeyPath,
) -> Result<ResolvedValue, ResolveError> {
    let map = match value.as_map() {
        Some(map) => map,
        // An unset condition section may be an empty string from the
        // loader; treat anything non-mapping as empty.
        None => return Ok(ResolvedValue::Map(IndexMap::new())),
    };

    let mut out = IndexMap::new();
    for (key, item) in map {
        let key_leaf = resolve_string(key, var_man, false, &path.key(key))?;
        let resolved_key = key_leaf
            .as_resolved()
            .expect("non-deferred leaf is resolved")
            .to_string();
        let resolved_value = resolve_section(item, var_man, false, &path.key(key))?;
        out.insert(resolved_key, resolved_value);
    }
    Ok(ResolvedValue::Map(out))
}

/// The phase-1 artifact handed to the allocated node.
///
/// Holds the resolved tree (with parsed templates inside the deferred
/// leaves) and the variable manager, so phase 2 needs neither the raw
/// config nor a parser run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub config: ResolvedValue,
    pub var_man: VariableSetManager,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, ResolveError> {
        serde_json::to_string(self).map_err(|err| ResolveError::Snapshot {
            action: "serialize",
            message: err.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ResolveError> {
        serde_json::from_str(json).map_err(|err| ResolveError::Snapshot {
            action: "load",
            message: err.to_string(),
        })
    }
}

/// Make a manager fully concrete using allocation-time variables.
///
/// Whole-variable deferrals are swapped in from `new_vars`; the
/// fine-grained entries left behind by reference resolution are then
/// fixpoint-resolved (they may reference each other).
pub fn undefer(
    var_man: &mut VariableSetManager,
    new_vars: &VariableSetManager,
) -> Result<(), ResolveError> {
    var_man.undefer_whole(new_vars)?;

    while var_man.has_deferred() {
        let mut progressed = false;

        for key in var_man.deferred_keys() {
            let raw = var_man.get_raw(&key)?;
            let (set, name, index, subkey) = &key;
            let key_path = format!("variables.{}.{}", set, name);

            let template = parse_template(&raw).map_err(|err| ResolveError::Syntax {
                key_path: key_path.clone(),
                raw: raw.clone(),
                err,
            })?;

            match resolve_template(&template, var_man) {
                Ok(StringResult::Resolved(value)) => {
                    var_man.set_value(
                        &ResolvedKey {
                            set: *set,
                            name: name.clone(),
                            index: index.map(VarIndex::At),
                            subkey: subkey.clone(),
                        },
                        value,
                    );
                    var_man.remove_deferred(&key);
                    progressed = true;
                }
                Ok(StringResult::Deferred(_)) => continue,
                Err(err) => {
                    return Err(ResolveError::Eval {
                        key_path,
                        raw,
                        err,
                    })
                }
            }
        }

        if !progressed {
            let vars = var_man
                .deferred_keys()
                .iter()
                .map(|(set, name, _, _)| format!("{}.{}", set, name))
                .collect();
            return Err(ResolveError::Cycle { vars });
        }
    }

    Ok(())
}

/// Phase 2: re-resolve only the leaves phase 1 left deferred.
///
/// The manager must be fully concrete (see [`undefer`]). Resolved leaves
/// pass through untouched — idempotence is load-bearing here, since their
/// strings may contain text that would parse as template syntax.
pub fn resolve_deferred(
    config: &ResolvedValue,
    var_man: &VariableSetManager,
) -> Result<ResolvedValue, ResolveError> {
    if var_man.has_deferred() {
        let vars = var_man
            .deferred_keys()
            .iter()
            .map(|(set, name, _, _)| format!("{}.{}", set, name))
            .collect();
        return Err(ResolveError::IncompleteUndefer { vars });
    }

    walk_deferred(config, var_man, &KeyPath::root())
}

fn walk_deferred(
    value: &ResolvedValue,
    var_man: &VariableSetManager,
    path: &KeyPath,
) -> Result<ResolvedValue, ResolveError> {
    match value {
        ResolvedValue::Leaf(ResolvedLeaf::Resolved(_)) => Ok(value.clone()),
        ResolvedValue::Leaf(ResolvedLeaf::Deferred { raw, template }) => {
            match resolve_template(template, var_man) {
                Ok(StringResult::Resolved(resolved)) => {
                    debug!(key = %path, "resolved deferred value");
                    Ok(ResolvedValue::Leaf(ResolvedLeaf::Resolved(resolved)))
                }
                Ok(StringResult::Deferred(_)) => Err(ResolveError::StillDeferred {
                    key_path: path.to_string(),
                }),
                Err(err) => Err(ResolveError::Eval {
                    key_path: path.to_string(),
                    raw: raw.clone(),
                    err,
                }),
            }
        }
        ResolvedValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                out.push(walk_deferred(item, var_man, &path.index(index))?);
            }
            Ok(ResolvedValue::List(out))
        }
        ResolvedValue::Map(map) => {
            let mut out = IndexMap::new();
            for (key, item) in map {
                out.insert(key.clone(), walk_deferred(item, var_man, &path.key(key))?);
            }
            Ok(ResolvedValue::Map(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_vars::{SetName, VariableSet};

    fn cfg(json: &str) -> ConfigValue {
        serde_json::from_str(json).unwrap()
    }

    fn kickoff_man() -> VariableSetManager {
        let mut var = VariableSet::new(SetName::Var);
        var.insert_scalar("user", "bob").unwrap();
        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_deferred("nodes").unwrap();

        let mut man = VariableSetManager::new();
        man.add_var_set(var).unwrap();
        man.add_var_set(sched).unwrap();
        man
    }

    fn allocation_man() -> VariableSetManager {
        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_scalar("nodes", "16").unwrap();
        let mut man = VariableSetManager::new();
        man.add_var_set(sched).unwrap();
        man
    }

    #[test]
    fn test_deferred_allowed_in_run() {
        let config = cfg(r#"{"run": {"cmds": ["srun -N {{nodes}} ./test"]}}"#);
        let resolved = resolve_test_vars(&config, &kickoff_man()).unwrap();
        assert!(resolved.any_deferred());
    }

    #[test]
    fn test_deferred_forbidden_in_build() {
        let config = cfg(r#"{"build": {"cmds": ["make -j {{nodes}}"]}}"#);
        let err = resolve_test_vars(&config, &kickoff_man()).unwrap_err();
        match err {
            ResolveError::DeferredForbidden { key_path, var, .. } => {
                assert_eq!(key_path, "build.cmds.0");
                assert_eq!(var, "sched.nodes");
            }
            other => panic!("expected DeferredForbidden, got {}", other),
        }
    }

    #[test]
    fn test_deferred_forbidden_in_root_scalar() {
        let config = cfg(r#"{"summary": "{{nodes}} nodes"}"#);
        assert!(matches!(
            resolve_test_vars(&config, &kickoff_man()),
            Err(ResolveError::DeferredForbidden { .. })
        ));
    }

    #[test]
    fn test_full_two_phase_cycle() {
        let config = cfg(
            r#"{"build": {"cmds": ["make"]},
                "run": {"cmds": ["srun -N {{nodes}} ./test ({{user}})"]}}"#,
        );
        let man = kickoff_man();
        let phase1 = resolve_test_vars(&config, &man).unwrap();

        // Hand off through the serialized snapshot.
        let snapshot = Snapshot {
            config: phase1,
            var_man: man,
        };
        let json = snapshot.to_json().unwrap();
        let mut snapshot = Snapshot::from_json(&json).unwrap();

        undefer(&mut snapshot.var_man, &allocation_man()).unwrap();
        let phase2 = resolve_deferred(&snapshot.config, &snapshot.var_man).unwrap();

        assert!(!phase2.any_deferred());
        assert_eq!(
            phase2
                .get("run")
                .and_then(|r| r.get("cmds"))
                .and_then(|c| match c {
                    ResolvedValue::List(items) => items[0].as_str(),
                    _ => None,
                }),
            Some("srun -N 16 ./test (bob)")
        );
        // Phase 1 results pass through untouched.
        assert_eq!(
            phase2
                .get("build")
                .and_then(|b| b.get("cmds"))
                .and_then(|c| match c {
                    ResolvedValue::List(items) => items[0].as_str(),
                    _ => None,
                }),
            Some("make")
        );
    }

    #[test]
    fn test_phase2_idempotent_on_literal_braces() {
        // Phase 1 turns the escaped marker into literal braces. Phase 2
        // must pass the resolved string through without re-parsing it,
        // even though it now looks like template syntax.
        let man = VariableSetManager::new();
        let config = cfg(r#"{"run": {"cmds": ["echo \\{{ literal }}"]}}"#);
        let phase1 = resolve_test_vars(&config, &man).unwrap();
        let phase2 = resolve_deferred(&phase1, &man).unwrap();

        assert_eq!(
            phase2
                .get("run")
                .and_then(|r| r.get("cmds"))
                .and_then(|c| match c {
                    ResolvedValue::List(items) => items[0].as_str(),
                    _ => None,
                }),
            Some("echo {{ literal }}")
        );
    }

    #[test]
    fn test_phase2_requires_concrete_manager() {
        let config = cfg(r#"{"run": {"cmds": ["{{nodes}}"]}}"#);
        let man = kickoff_man();
        let phase1 = resolve_test_vars(&config, &man).unwrap();
        assert!(matches!(
            resolve_deferred(&phase1, &man),
            Err(ResolveError::IncompleteUndefer { .. })
        ));
    }

    #[test]
    fn test_condition_keys_resolve() {
        let config = cfg(r#"{"not_if": {"{{user}}": ["jerry"]}}"#);
        let resolved = resolve_test_vars(&config, &kickoff_man()).unwrap();
        let not_if = resolved.get("not_if").and_then(ResolvedValue::as_map).unwrap();
        assert!(not_if.contains_key("bob"));
    }
}
