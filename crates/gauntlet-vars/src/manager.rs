//! The variable set manager: one namespace per test instance.
//!
//! Composes the four variable sets, provides complex-key lookups with
//! category precedence, tracks deferred values, and produces the rebound
//! managers the permutation engine needs. Anything that works with
//! variables goes through this type.

use crate::error::VariableError;
use crate::list::VariableList;
use crate::set::{SetName, VarEntry, VariableSet};
use gauntlet_ast::{KeySegment, VarKey};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifies the source of a deferred value in errors and markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredTag {
    pub set: SetName,
    pub name: String,
}

impl fmt::Display for DeferredTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.set, self.name)
    }
}

/// A deferral record: whole variable (`None, None`), one list element, or
/// one sub-key of one element.
pub type DeferredKey = (SetName, String, Option<usize>, Option<String>);

/// Index part of a resolved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarIndex {
    At(usize),
    /// `*` — the whole list.
    All,
}

/// A key resolved against the manager: the category is never ambiguous
/// here, unlike in the written form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedKey {
    pub set: SetName,
    pub name: String,
    pub index: Option<VarIndex>,
    pub subkey: Option<String>,
}

impl fmt::Display for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.set, self.name)?;
        match self.index {
            Some(VarIndex::At(i)) => write!(f, ".{}", i)?,
            Some(VarIndex::All) => write!(f, ".*")?,
            None => {}
        }
        if let Some(subkey) = &self.subkey {
            write!(f, ".{}", subkey)?;
        }
        Ok(())
    }
}

/// The outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum VarLookup {
    /// A single value.
    Scalar(String),
    /// All values of a list (wildcard index).
    List(Vec<String>),
    /// The value is not knowable until allocation.
    Deferred(DeferredTag),
}

/// Manager for the full variable namespace of one test instance.
///
/// Read-only after construction, except for the reference-resolution
/// rewrite and the single rebinding step performed by the permutation
/// engine. Cloning is deep and cheap enough to do once per permutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariableSetManager {
    sets: IndexMap<SetName, VariableSet>,
    /// Deferred records; a BTreeSet keeps snapshots deterministic.
    deferred: BTreeSet<DeferredKey>,
}

impl VariableSetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable set. Whole-variable deferrals in the set are
    /// registered automatically.
    pub fn add_var_set(&mut self, set: VariableSet) -> Result<(), VariableError> {
        if self.sets.contains_key(&set.name()) {
            return Err(VariableError::DuplicateSet(set.name()));
        }
        for name in set.deferred_names() {
            self.deferred
                .insert((set.name(), name.to_string(), None, None));
        }
        self.sets.insert(set.name(), set);
        Ok(())
    }

    pub fn set(&self, name: SetName) -> Option<&VariableSet> {
        self.sets.get(&name)
    }

    /// Parse a key's segments into (category, name, index, subkey).
    fn parse_key(
        &self,
        key: &VarKey,
    ) -> Result<(Option<SetName>, String, Option<VarIndex>, Option<String>), VariableError> {
        let mut segments = key.segments.iter().peekable();

        let bad = |msg: &str| VariableError::BadReference(key.to_string(), msg.to_string());

        // Optional category prefix, then the variable name.
        let first = match segments.next() {
            Some(KeySegment::Name(name)) => name,
            Some(_) => return Err(bad("the variable name must come first")),
            None => return Err(bad("empty reference")),
        };

        let (set, name) = match SetName::from_prefix(first) {
            Some(set) => match segments.next() {
                Some(KeySegment::Name(name)) => (Some(set), name.clone()),
                Some(_) => return Err(bad("expected a variable name after the category")),
                None => return Err(bad("no variable name given")),
            },
            None => (None, first.clone()),
        };

        // Optional index (numeric or wildcard); a name here is a subkey.
        let index = match segments.peek() {
            Some(KeySegment::Index(i)) => {
                let i = *i;
                segments.next();
                Some(VarIndex::At(i))
            }
            Some(KeySegment::Wildcard) => {
                segments.next();
                Some(VarIndex::All)
            }
            _ => None,
        };

        let subkey = match segments.next() {
            Some(KeySegment::Name(subkey)) => Some(subkey.clone()),
            Some(_) => return Err(bad("a wildcard can only be used as an index")),
            None => None,
        };

        if segments.next().is_some() {
            return Err(bad("too many parts"));
        }

        Ok((set, name, index, subkey))
    }

    /// Resolve a key: unlike [`Self::parse_key`], the returned category is
    /// never ambiguous — unqualified names check the sets in resolution
    /// order and the first set containing the name wins.
    pub fn resolve_key(&self, key: &VarKey) -> Result<ResolvedKey, VariableError> {
        let (set, name, index, subkey) = self.parse_key(key)?;

        let set = match set {
            Some(set) => set,
            None => SetName::RESOLUTION_ORDER
                .iter()
                .copied()
                .find(|set| {
                    self.sets
                        .get(set)
                        .map(|s| s.contains(&name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| VariableError::NotFound(name.clone()))?,
        };

        Ok(ResolvedKey {
            set,
            name,
            index,
            subkey,
        })
    }

    /// Whether the name resolves in any set (qualified or not).
    pub fn contains(&self, key: &VarKey) -> bool {
        self.resolve_key(key).map_or(false, |resolved| {
            self.sets
                .get(&resolved.set)
                .map(|set| set.contains(&resolved.name))
                .unwrap_or(false)
        })
    }

    /// Mark a variable (or one element / sub-key of it) deferred.
    pub fn set_deferred(
        &mut self,
        set: SetName,
        name: impl Into<String>,
        index: Option<usize>,
        subkey: Option<String>,
    ) {
        // A sub-key deferral always has an index; single-valued variables
        // use index 0.
        let index = if index.is_none() && subkey.is_some() {
            Some(0)
        } else {
            index
        };
        self.deferred.insert((set, name.into(), index, subkey));
    }

    /// Whether the exact location a key points at is deferred.
    pub fn is_deferred(&self, key: &ResolvedKey) -> bool {
        let index = match key.index {
            Some(VarIndex::At(i)) => i,
            // Wildcards read the whole list, so any deferral defers them.
            Some(VarIndex::All) => return self.any_deferred(key.set, &key.name),
            None => 0,
        };

        self.deferred
            .contains(&(key.set, key.name.clone(), None, None))
            || self
                .deferred
                .contains(&(key.set, key.name.clone(), Some(index), None))
            || self.deferred.contains(&(
                key.set,
                key.name.clone(),
                Some(index),
                key.subkey.clone(),
            ))
    }

    /// Whether any part of the variable is deferred.
    pub fn any_deferred(&self, set: SetName, name: &str) -> bool {
        self.deferred
            .iter()
            .any(|(dset, dname, _, _)| *dset == set && dname == name)
    }

    /// All deferred records, in deterministic order.
    pub fn deferred_keys(&self) -> Vec<DeferredKey> {
        self.deferred.iter().cloned().collect()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn remove_deferred(&mut self, key: &DeferredKey) {
        self.deferred.remove(key);
    }

    /// Look up a key, returning its value or a deferred marker.
    pub fn lookup(&self, key: &VarKey) -> Result<VarLookup, VariableError> {
        let resolved = self.resolve_key(key)?;

        if self.is_deferred(&resolved) {
            return Ok(VarLookup::Deferred(DeferredTag {
                set: resolved.set,
                name: resolved.name,
            }));
        }

        let set = self
            .sets
            .get(&resolved.set)
            .ok_or_else(|| VariableError::NotFound(resolved.name.clone()))?;
        let list = set.list(&resolved.name)?;
        let display = format!("{}.{}", resolved.set, resolved.name);

        match resolved.index {
            Some(VarIndex::All) => Ok(VarLookup::List(
                list.get_all(&display, resolved.subkey.as_deref())?,
            )),
            Some(VarIndex::At(i)) => Ok(VarLookup::Scalar(
                list.get(&display, Some(i), resolved.subkey.as_deref())?
                    .to_string(),
            )),
            None => Ok(VarLookup::Scalar(
                list.get(&display, None, resolved.subkey.as_deref())?
                    .to_string(),
            )),
        }
    }

    /// Number of values bound to `set.name`.
    pub fn len(&self, set: SetName, name: &str) -> Result<usize, VariableError> {
        if self.any_deferred(set, name) {
            return Err(VariableError::Deferred(format!("{}.{}", set, name)));
        }
        let var_set = self
            .sets
            .get(&set)
            .ok_or_else(|| VariableError::NotFound(name.to_string()))?;
        Ok(var_set.list(name)?.len())
    }

    /// Ordered sub-keys of a mapping-valued variable (empty for scalars).
    pub fn keys(&self, set: SetName, name: &str) -> Result<Vec<String>, VariableError> {
        let var_set = self
            .sets
            .get(&set)
            .ok_or_else(|| VariableError::NotFound(name.to_string()))?;
        Ok(var_set
            .list(name)?
            .subkeys()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Read the raw string at an exact location, ignoring deferral state.
    ///
    /// Used by phase 2 to re-read values that were deferred at kickoff.
    pub fn get_raw(&self, key: &DeferredKey) -> Result<String, VariableError> {
        let (set, name, index, subkey) = key;
        let var_set = self
            .sets
            .get(set)
            .ok_or_else(|| VariableError::NotFound(name.clone()))?;
        let display = format!("{}.{}", set, name);
        Ok(var_set
            .list(name)?
            .get(&display, *index, subkey.as_deref())?
            .to_string())
    }

    /// Overwrite the value at a resolved location (reference resolution).
    pub fn set_value(&mut self, key: &ResolvedKey, value: String) {
        let index = match key.index {
            Some(VarIndex::At(i)) => i,
            _ => 0,
        };
        if let Some(set) = self.sets.get_mut(&key.set) {
            set.set_value(&key.name, index, key.subkey.as_deref(), value);
        }
    }

    /// For every combination of the used permutation variables, return a
    /// manager with each one rebound to a single value.
    ///
    /// The cross product size is `∏ len(var_i)`; with no used variables
    /// (or all single-valued) the result is one manager.
    pub fn get_permutations(
        &self,
        used: &[(SetName, String)],
    ) -> Result<Vec<(Vec<(SetName, String, usize)>, VariableSetManager)>, VariableError> {
        // Build every index assignment first; sizes are knowable up front
        // because permuted variables may not be deferred.
        let mut combos: Vec<Vec<(SetName, String, usize)>> = vec![Vec::new()];
        for (set, name) in used {
            let len = self.len(*set, name)?;
            let mut next = Vec::with_capacity(combos.len() * len);
            for combo in &combos {
                for i in 0..len {
                    let mut extended = combo.clone();
                    extended.push((*set, name.clone(), i));
                    next.push(extended);
                }
            }
            combos = next;
        }

        let mut managers = Vec::with_capacity(combos.len());
        for combo in combos {
            let mut manager = self.clone();
            for (set, name, index) in &combo {
                let bound = {
                    let var_set = manager
                        .sets
                        .get(set)
                        .ok_or_else(|| VariableError::NotFound(name.clone()))?;
                    let list = var_set.list(name)?;
                    let len = list.len();
                    list.single(*index)
                        .ok_or_else(|| VariableError::IndexOutOfRange {
                            key: format!("{}.{}", set, name),
                            index: *index,
                            len,
                        })?
                };
                if let Some(var_set) = manager.sets.get_mut(set) {
                    var_set.replace(name, VarEntry::Values(bound));
                }
            }
            managers.push((combo, manager));
        }

        Ok(managers)
    }

    /// Swap in concrete values for every whole-variable deferral, from a
    /// manager built on the allocated node.
    ///
    /// Fine-grained deferrals (individual elements produced by reference
    /// resolution) stay; the resolve layer fixpoints them afterwards since
    /// they need the template parser.
    pub fn undefer_whole(&mut self, new_vars: &VariableSetManager) -> Result<(), VariableError> {
        let whole: Vec<DeferredKey> = self
            .deferred
            .iter()
            .filter(|(_, _, index, subkey)| index.is_none() && subkey.is_none())
            .cloned()
            .collect();

        for key in whole {
            let (set, name, _, _) = &key;
            let new_set = new_vars
                .sets
                .get(set)
                .ok_or_else(|| VariableError::NotFound(name.clone()))?;
            let list = new_set.list(name)?.clone();

            if let Some(var_set) = self.sets.get_mut(set) {
                var_set.replace(name, VarEntry::Values(list));
            }
            self.deferred.remove(&key);
        }

        Ok(())
    }

    /// Rebind one variable to a fresh list (used when folding permutation
    /// results back into per-test managers).
    pub fn rebind(&mut self, set: SetName, name: &str, list: VariableList) {
        if let Some(var_set) = self.sets.get_mut(&set) {
            var_set.replace(name, VarEntry::Values(list));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::VariableList;

    fn key(s: &str) -> VarKey {
        VarKey::parse(s).unwrap()
    }

    fn manager() -> VariableSetManager {
        let mut var = VariableSet::new(SetName::Var);
        var.insert_scalar("user", "bob").unwrap();
        var.insert("people", VariableList::scalars(["Robert", "Suzy", "Yennifer"]).unwrap())
            .unwrap();

        let mut sys = VariableSet::new(SetName::Sys);
        sys.insert_scalar("user", "os_login").unwrap();
        sys.insert_scalar("sys_name", "tester").unwrap();

        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_deferred("nodes").unwrap();

        let mut man = VariableSetManager::new();
        man.add_var_set(var).unwrap();
        man.add_var_set(sys).unwrap();
        man.add_var_set(sched).unwrap();
        man
    }

    #[test]
    fn test_unqualified_precedence() {
        let man = manager();
        // var wins over sys for the unqualified name.
        assert_eq!(
            man.lookup(&key("user")).unwrap(),
            VarLookup::Scalar("bob".to_string())
        );
        // The qualified form reaches the shadowed set.
        assert_eq!(
            man.lookup(&key("sys.user")).unwrap(),
            VarLookup::Scalar("os_login".to_string())
        );
    }

    #[test]
    fn test_wildcard_lookup() {
        let man = manager();
        assert_eq!(
            man.lookup(&key("people.*")).unwrap(),
            VarLookup::List(vec![
                "Robert".to_string(),
                "Suzy".to_string(),
                "Yennifer".to_string()
            ])
        );
    }

    #[test]
    fn test_deferred_lookup() {
        let man = manager();
        match man.lookup(&key("sched.nodes")).unwrap() {
            VarLookup::Deferred(tag) => assert_eq!(tag.to_string(), "sched.nodes"),
            other => panic!("expected deferred, got {:?}", other),
        }
        // Unqualified form finds it too (nothing shadows it).
        assert!(matches!(
            man.lookup(&key("nodes")).unwrap(),
            VarLookup::Deferred(_)
        ));
    }

    #[test]
    fn test_not_found() {
        let man = manager();
        assert!(matches!(
            man.lookup(&key("missing")),
            Err(VariableError::NotFound(_))
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let man = manager();
        assert!(matches!(
            man.lookup(&key("people.7")),
            Err(VariableError::IndexOutOfRange { index: 7, len: 3, .. })
        ));
    }

    #[test]
    fn test_len_of_deferred_errors() {
        let man = manager();
        assert!(matches!(
            man.len(SetName::Sched, "nodes"),
            Err(VariableError::Deferred(_))
        ));
    }

    #[test]
    fn test_permutations_cardinality() {
        let mut man = manager();
        let mut var2 = VariableSet::new(SetName::Pav);
        var2.insert("modes", VariableList::scalars(["a", "b"]).unwrap())
            .unwrap();
        man.add_var_set(var2).unwrap();

        let perms = man
            .get_permutations(&[
                (SetName::Var, "people".to_string()),
                (SetName::Pav, "modes".to_string()),
            ])
            .unwrap();
        assert_eq!(perms.len(), 6);

        // Every permuted manager has single-valued rebindings.
        for (combo, perm) in &perms {
            assert_eq!(combo.len(), 2);
            assert_eq!(perm.len(SetName::Var, "people").unwrap(), 1);
            assert_eq!(perm.len(SetName::Pav, "modes").unwrap(), 1);
        }

        // Untouched variables are shared as-is.
        let (_, first) = &perms[0];
        assert_eq!(
            first.lookup(&key("user")).unwrap(),
            VarLookup::Scalar("bob".to_string())
        );
    }

    #[test]
    fn test_permutation_on_deferred_errors() {
        let man = manager();
        assert!(man
            .get_permutations(&[(SetName::Sched, "nodes".to_string())])
            .is_err());
    }

    #[test]
    fn test_fine_grained_deferral() {
        let mut man = manager();
        man.set_deferred(SetName::Var, "user", None, Some("shell".to_string()));
        let resolved = man.resolve_key(&key("var.user.0.shell")).unwrap();
        assert!(man.is_deferred(&resolved));
        // The bare value is not deferred.
        let bare = man.resolve_key(&key("var.user")).unwrap();
        assert!(!man.is_deferred(&bare));
    }

    #[test]
    fn test_too_many_parts() {
        let man = manager();
        // Five parts can't even parse as a key.
        assert!(VarKey::parse("var.people.0.name.extra").is_err());
        // Four parts without a category is one too many.
        assert!(matches!(
            man.lookup(&key("people.0.name.extra")),
            Err(VariableError::BadReference(..))
        ));
    }
}
