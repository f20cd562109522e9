//! Variable-to-variable reference resolution.
//!
//! Values in the `var` set may themselves be templates referencing other
//! variables (`b: "{{a}}-suffix"`). This pass resolves them in dependency
//! order with an iterative fixpoint: each round resolves every value whose
//! references are already concrete; a round that makes no progress means
//! the remaining values form a reference loop.
//!
//! References to deferred system/scheduler variables don't fail here —
//! the referencing value becomes a fine-grained deferred entry, finished
//! in phase 2.

use crate::error::ResolveError;
use crate::strings::{resolve_template, StringResult};
use gauntlet_ast::{Template, TemplateItem, VarKey};
use gauntlet_parser::parse_template;
use gauntlet_vars::{
    ResolvedKey, SetName, VarEntry, VarIndex, VarValue, VariableSetManager,
};
use std::collections::HashSet;
use tracing::trace;

/// One unresolved location: a list element or sub-key of a `var` value.
struct Unresolved {
    name: String,
    index: usize,
    subkey: Option<String>,
    template: Template,
    references: Vec<VarKey>,
}

impl Unresolved {
    fn key_path(&self) -> String {
        match &self.subkey {
            Some(subkey) => format!("variables.{}.{}.{}", self.name, self.index, subkey),
            None => format!("variables.{}.{}", self.name, self.index),
        }
    }

    fn resolved_key(&self) -> ResolvedKey {
        ResolvedKey {
            set: SetName::Var,
            name: self.name.clone(),
            index: Some(VarIndex::At(self.index)),
            subkey: self.subkey.clone(),
        }
    }
}

/// Collect every variable reference in a template, including inside
/// repeat sections.
fn template_refs(template: &Template) -> Vec<VarKey> {
    fn walk(items: &[TemplateItem], out: &mut Vec<VarKey>) {
        for item in items {
            match item {
                TemplateItem::Literal(_) => {}
                TemplateItem::Expr(block) => {
                    let mut keys = Vec::new();
                    block.expr.referenced_vars(&mut keys);
                    out.extend(keys.into_iter().cloned());
                }
                TemplateItem::Repeat(repeat) => walk(&repeat.items, out),
            }
        }
    }

    let mut out = Vec::new();
    walk(&template.items, &mut out);
    out
}

/// Find every templated location in the `var` set.
fn collect_unresolved(var_man: &VariableSetManager) -> Result<Vec<Unresolved>, ResolveError> {
    let mut unresolved = Vec::new();

    let var_set = match var_man.set(SetName::Var) {
        Some(set) => set,
        None => return Ok(unresolved),
    };

    for name in var_set.var_names() {
        let list = match var_set.entry(name) {
            Some(VarEntry::Values(list)) => list,
            _ => continue,
        };

        for (index, value) in list.values().iter().enumerate() {
            let locations: Vec<(Option<String>, String)> = match value {
                VarValue::Scalar(raw) => vec![(None, raw.clone())],
                VarValue::Map(map) => map
                    .iter()
                    .map(|(k, v)| (Some(k.clone()), v.clone()))
                    .collect(),
            };

            for (subkey, raw) in locations {
                let key_path = match &subkey {
                    Some(sk) => format!("variables.{}.{}.{}", name, index, sk),
                    None => format!("variables.{}.{}", name, index),
                };
                let template = parse_template(&raw).map_err(|err| ResolveError::Syntax {
                    key_path,
                    raw: raw.clone(),
                    err,
                })?;
                if !template.has_substitutions() {
                    continue;
                }
                let references = template_refs(&template);
                unresolved.push(Unresolved {
                    name: name.to_string(),
                    index,
                    subkey,
                    template,
                    references,
                });
            }
        }
    }

    Ok(unresolved)
}

/// Whether a reference points at a still-unresolved `var` location.
///
/// `pending` holds (name, index, subkey) triples; a wildcard or
/// unindexed reference is blocked by any pending element of the variable.
fn blocked(
    reference: &VarKey,
    pending: &HashSet<(String, usize, Option<String>)>,
    var_man: &VariableSetManager,
) -> bool {
    let resolved = match var_man.resolve_key(reference) {
        Ok(resolved) => resolved,
        // Lookup errors surface during evaluation, with a proper span.
        Err(_) => return false,
    };

    if resolved.set != SetName::Var {
        return false;
    }

    match resolved.index {
        Some(VarIndex::All) | None => pending
            .iter()
            .any(|(name, _, subkey)| *name == resolved.name && *subkey == resolved.subkey),
        Some(VarIndex::At(index)) => {
            pending.contains(&(resolved.name.clone(), index, resolved.subkey.clone()))
        }
    }
}

/// Resolve all templated values in the `var` set, in place.
///
/// Each location (list element or sub-key) resolves independently, so
/// `a.0` may resolve while `a.1` waits on a deferred reference.
pub fn resolve_references(var_man: &mut VariableSetManager) -> Result<(), ResolveError> {
    let mut unresolved = collect_unresolved(var_man)?;

    while !unresolved.is_empty() {
        let pending: HashSet<(String, usize, Option<String>)> = unresolved
            .iter()
            .map(|entry| (entry.name.clone(), entry.index, entry.subkey.clone()))
            .collect();

        let mut remaining = Vec::new();
        let mut progressed = false;

        for entry in unresolved {
            let is_blocked = entry
                .references
                .iter()
                // A location may reference a sibling element of its own
                // variable, but not itself; self-blocking would deadlock
                // immediately and is reported as a cycle below.
                .any(|reference| blocked(reference, &pending, var_man));

            if is_blocked {
                remaining.push(entry);
                continue;
            }

            match resolve_template(&entry.template, var_man) {
                Ok(StringResult::Resolved(value)) => {
                    trace!(key = %entry.key_path(), "resolved variable reference");
                    var_man.set_value(&entry.resolved_key(), value);
                }
                Ok(StringResult::Deferred(tag)) => {
                    trace!(key = %entry.key_path(), %tag, "variable value deferred");
                    var_man.set_deferred(
                        SetName::Var,
                        entry.name.clone(),
                        Some(entry.index),
                        entry.subkey.clone(),
                    );
                }
                Err(err) => {
                    return Err(ResolveError::Eval {
                        key_path: entry.key_path(),
                        raw: entry.template.source.clone(),
                        err,
                    });
                }
            }
            progressed = true;
        }

        if !remaining.is_empty() && !progressed {
            let mut vars: Vec<String> = remaining.iter().map(|entry| entry.name.clone()).collect();
            vars.sort();
            vars.dedup();
            return Err(ResolveError::Cycle { vars });
        }

        unresolved = remaining;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_vars::{VarLookup, VariableSet};

    fn key(s: &str) -> VarKey {
        VarKey::parse(s).unwrap()
    }

    fn manager(vars: &[(&str, &str)]) -> VariableSetManager {
        let mut var = VariableSet::new(SetName::Var);
        for (name, value) in vars {
            var.insert_scalar(*name, *value).unwrap();
        }
        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_deferred("nodes").unwrap();

        let mut man = VariableSetManager::new();
        man.add_var_set(var).unwrap();
        man.add_var_set(sched).unwrap();
        man
    }

    #[test]
    fn test_simple_chain() {
        let mut man = manager(&[("a", "base"), ("b", "{{a}}-ext"), ("c", "{{b}}!")]);
        resolve_references(&mut man).unwrap();
        assert_eq!(
            man.lookup(&key("c")).unwrap(),
            VarLookup::Scalar("base-ext!".to_string())
        );
    }

    #[test]
    fn test_cycle_detected() {
        let mut man = manager(&[("a", "{{b}}"), ("b", "{{a}}")]);
        let err = resolve_references(&mut man).unwrap_err();
        match err {
            ResolveError::Cycle { vars } => {
                assert_eq!(vars, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("expected cycle error, got {}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut man = manager(&[("a", "{{a}} again")]);
        assert!(matches!(
            resolve_references(&mut man),
            Err(ResolveError::Cycle { .. })
        ));
    }

    #[test]
    fn test_deferred_reference_becomes_deferred() {
        let mut man = manager(&[("per_node", "{{nodes}} tasks")]);
        resolve_references(&mut man).unwrap();
        assert!(matches!(
            man.lookup(&key("per_node")).unwrap(),
            VarLookup::Deferred(_)
        ));
    }

    #[test]
    fn test_expression_only_value_resolves() {
        let mut man = manager(&[("count", "{{ 2 + 2 }}")]);
        resolve_references(&mut man).unwrap();
        assert_eq!(
            man.lookup(&key("count")).unwrap(),
            VarLookup::Scalar("4".to_string())
        );
    }

    #[test]
    fn test_unknown_reference_errors() {
        let mut man = manager(&[("a", "{{ missing }}")]);
        assert!(matches!(
            resolve_references(&mut man),
            Err(ResolveError::Eval { .. })
        ));
    }
}
