//! Test inheritance resolution.
//!
//! Tests in a suite may inherit from one another (`inherits_from`); hosts
//! and modes layer below the suite. Merging is child-wins: mappings
//! deep-merge key by key, while lists and strings are replaced wholesale —
//! a child's `run.cmds` fully replaces the parent's, never appends.
//!
//! Resolution walks the inheritance tree from the base downward with a
//! worklist; anything left when the worklist drains has a missing parent
//! or sits on a cycle.

use crate::config::ConfigValue;
use crate::error::ResolveError;
use indexmap::IndexMap;
use tracing::debug;

/// Tests whose names start with this are hidden: they can be inherited
/// from but are excluded from whole-suite runs.
pub const HIDDEN_PREFIX: &str = "_";

/// Key naming a test's parent. Never inherited itself.
const INHERITS_FROM: &str = "inherits_from";

/// The implicit root every test ultimately inherits from.
const BASE: &str = "__base__";

/// Merge `child` onto `parent`, child winning.
///
/// Mappings merge recursively; everything else (strings *and lists*) is
/// replaced outright.
pub fn merge(parent: &ConfigValue, child: &ConfigValue) -> ConfigValue {
    match (parent, child) {
        (ConfigValue::Map(parent_map), ConfigValue::Map(child_map)) => {
            let mut merged = parent_map.clone();
            for (key, child_value) in child_map {
                let value = match merged.get(key) {
                    Some(parent_value) => merge(parent_value, child_value),
                    None => child_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            ConfigValue::Map(merged)
        }
        _ => child.clone(),
    }
}

/// Fold `prepend_cmds`/`append_cmds` into `cmds` for the build and run
/// sections, clearing them so they apply exactly once per merge layer.
pub fn fold_cmd_extensions(config: &mut ConfigValue) {
    let map = match config.as_map_mut() {
        Some(map) => map,
        None => return,
    };

    for section in ["build", "run"] {
        let section_map = match map.get_mut(section).and_then(ConfigValue::as_map_mut) {
            Some(section_map) => section_map,
            None => continue,
        };

        let prepend = take_list(section_map, "prepend_cmds");
        let append = take_list(section_map, "append_cmds");
        if prepend.is_empty() && append.is_empty() {
            continue;
        }

        let mut cmds = match section_map.shift_remove("cmds") {
            Some(ConfigValue::List(cmds)) => cmds,
            Some(other) => vec![other],
            None => Vec::new(),
        };

        let mut new_cmds = prepend;
        new_cmds.append(&mut cmds);
        new_cmds.extend(append);
        section_map.insert("cmds".to_string(), ConfigValue::List(new_cmds));
    }
}

fn take_list(map: &mut IndexMap<String, ConfigValue>, key: &str) -> Vec<ConfigValue> {
    match map.shift_remove(key) {
        Some(ConfigValue::List(items)) => {
            // Leave an empty list so later merge layers see it cleared.
            map.insert(key.to_string(), ConfigValue::List(Vec::new()));
            items
        }
        Some(other) => {
            map.insert(key.to_string(), ConfigValue::List(Vec::new()));
            vec![other]
        }
        None => Vec::new(),
    }
}

/// Resolve inheritance for every test in a suite.
///
/// `base` is the fully-defaulted config (host and mode layers already
/// applied) each chain bottoms out in. Returns the tests in suite order
/// with `inherits_from` stripped from the output.
pub fn resolve_inheritance(
    base: &ConfigValue,
    suite: &IndexMap<String, ConfigValue>,
    suite_path: &str,
) -> Result<IndexMap<String, ConfigValue>, ResolveError> {
    let inherit_err = |message: String| ResolveError::Inheritance {
        suite_path: suite_path.to_string(),
        message,
    };

    if suite.is_empty() {
        return Err(inherit_err("the suite defines no tests".to_string()));
    }

    // Who inherits from whom, and which tests are ready to merge.
    let mut depended_on_by: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut ready: Vec<String> = Vec::new();
    let mut parents: IndexMap<String, String> = IndexMap::new();

    for (test_name, test_cfg) in suite {
        if test_cfg.as_map().is_none() {
            return Err(inherit_err(format!(
                "test '{}' is not a mapping",
                test_name
            )));
        }
        let parent = match test_cfg.get(INHERITS_FROM).and_then(ConfigValue::as_str) {
            Some(parent) => parent.to_string(),
            None => BASE.to_string(),
        };
        if parent == BASE {
            ready.push(test_name.clone());
        } else {
            depended_on_by
                .entry(parent.clone())
                .or_default()
                .push(test_name.clone());
        }
        parents.insert(test_name.clone(), parent);
    }

    let mut resolved: IndexMap<String, ConfigValue> = IndexMap::new();

    while let Some(test_name) = ready.pop() {
        let parent_name = &parents[&test_name];
        let parent_cfg = if parent_name == BASE {
            base
        } else {
            resolved
                .get(parent_name)
                .expect("worklist only schedules tests with resolved parents")
        };

        let mut merged = merge(parent_cfg, &suite[&test_name]);
        fold_cmd_extensions(&mut merged);
        if let Some(map) = merged.as_map_mut() {
            map.shift_remove(INHERITS_FROM);
        }
        debug!(test = %test_name, parent = %parent_name, "resolved inheritance");
        resolved.insert(test_name.clone(), merged);

        if let Some(children) = depended_on_by.shift_remove(&test_name) {
            ready.extend(children);
        }
    }

    // Anything left depends on a missing parent or sits on a cycle.
    if !depended_on_by.is_empty() {
        let mut missing: Vec<String> = Vec::new();
        for (parent, children) in &depended_on_by {
            if suite.contains_key(parent) {
                missing.push(format!(
                    "tests {:?} inherit from '{}', which is part of an inheritance cycle",
                    children, parent
                ));
            } else {
                missing.push(format!(
                    "tests {:?} inherit from '{}', which does not exist",
                    children, parent
                ));
            }
        }
        return Err(inherit_err(missing.join("; ")));
    }

    // Preserve the suite's declaration order.
    let mut ordered = IndexMap::new();
    for test_name in suite.keys() {
        if let Some(cfg) = resolved.shift_remove(test_name) {
            ordered.insert(test_name.clone(), cfg);
        }
    }

    Ok(ordered)
}

/// Whether a test name marks it hidden.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg(json: &str) -> ConfigValue {
        serde_json::from_str(json).unwrap()
    }

    fn suite(pairs: &[(&str, &str)]) -> IndexMap<String, ConfigValue> {
        pairs
            .iter()
            .map(|(name, json)| (name.to_string(), cfg(json)))
            .collect()
    }

    #[test]
    fn test_list_replaced_wholesale() {
        let parent = cfg(r#"{"run": {"cmds": ["a", "b"]}}"#);
        let child = cfg(r#"{"run": {"cmds": ["c"]}}"#);
        let merged = merge(&parent, &child);
        assert_eq!(merged, cfg(r#"{"run": {"cmds": ["c"]}}"#));
    }

    #[test]
    fn test_map_deep_merge() {
        let parent = cfg(r#"{"build": {"source": "v1.tar", "timeout": "30"}}"#);
        let child = cfg(r#"{"build": {"timeout": "60"}, "summary": "x"}"#);
        let merged = merge(&parent, &child);
        assert_eq!(
            merged,
            cfg(r#"{"build": {"source": "v1.tar", "timeout": "60"}, "summary": "x"}"#)
        );
    }

    #[test]
    fn test_inheritance_chain() {
        let base = cfg(r#"{"run": {"cmds": []}}"#);
        let tests = suite(&[
            ("grandparent", r#"{"run": {"cmds": ["base-cmd"]}, "summary": "gp"}"#),
            ("parent", r#"{"inherits_from": "grandparent", "summary": "p"}"#),
            ("child", r#"{"inherits_from": "parent", "run": {"cmds": ["mine"]}}"#),
        ]);

        let resolved = resolve_inheritance(&base, &tests, "suite.yaml").unwrap();
        let child = &resolved["child"];
        // Distant ancestor's summary survives through the chain.
        assert_eq!(child.get("summary").and_then(ConfigValue::as_str), Some("p"));
        // List keys replace, never merge.
        assert_eq!(
            child.get("run").unwrap().get("cmds").unwrap(),
            &cfg(r#"["mine"]"#)
        );
        // inherits_from is never part of the output.
        assert!(child.get("inherits_from").is_none());
    }

    #[test]
    fn test_missing_parent() {
        let base = ConfigValue::map();
        let tests = suite(&[("child", r#"{"inherits_from": "ghost"}"#)]);
        let err = resolve_inheritance(&base, &tests, "suite.yaml").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_inheritance_cycle() {
        let base = ConfigValue::map();
        let tests = suite(&[
            ("a", r#"{"inherits_from": "b"}"#),
            ("b", r#"{"inherits_from": "a"}"#),
        ]);
        let err = resolve_inheritance(&base, &tests, "suite.yaml").unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_hidden_tests_resolve_and_flag() {
        let base = ConfigValue::map();
        let tests = suite(&[
            ("_base", r#"{"summary": "shared"}"#),
            ("real", r#"{"inherits_from": "_base"}"#),
        ]);
        let resolved = resolve_inheritance(&base, &tests, "suite.yaml").unwrap();
        assert!(resolved.contains_key("_base"));
        assert_eq!(
            resolved["real"].get("summary").and_then(ConfigValue::as_str),
            Some("shared")
        );
        assert!(is_hidden("_base"));
        assert!(!is_hidden("real"));
    }

    #[test]
    fn test_cmd_extensions_fold_once() {
        let mut config = cfg(
            r#"{"run": {"prepend_cmds": ["module load gcc"], "cmds": ["./run"],
                 "append_cmds": ["cleanup"]}}"#,
        );
        fold_cmd_extensions(&mut config);
        let run = config.get("run").unwrap();
        assert_eq!(
            run.get("cmds").unwrap(),
            &cfg(r#"["module load gcc", "./run", "cleanup"]"#)
        );
        assert_eq!(run.get("prepend_cmds").unwrap(), &cfg("[]"));
        assert_eq!(run.get("append_cmds").unwrap(), &cfg("[]"));
    }
}
