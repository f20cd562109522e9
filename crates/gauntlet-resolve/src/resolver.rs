//! The resolver facade.
//!
//! Orchestrates the full pipeline for a suite of tests: host and mode
//! layering, inheritance, overrides, variable manager assembly,
//! permutation expansion, template resolution, and skip conditions. Each
//! test fails independently — one bad config never hides the rest of the
//! suite.

use crate::conditions::check_skip;
use crate::config::{ConfigValue, ResolvedConfig};
use crate::error::{ResolveError, TestFailure};
use crate::inherit::{fold_cmd_extensions, is_hidden, merge, resolve_inheritance};
use crate::overrides::apply_overrides;
use crate::permute::resolve_permutations;
use crate::phases::resolve_test_vars;
use crate::references::resolve_references;
use gauntlet_vars::{
    SetName, VarValue, VariableList, VariableSet, VariableSetManager, VariableSource,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything the facade produced for one suite: the resolved test
/// instances and the per-test failures. Neither hides the other.
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub configs: Vec<ResolvedConfig>,
    pub failures: Vec<TestFailure>,
}

/// The resolution engine's entry point.
///
/// Holds the external variable sources; everything else arrives per
/// call. Sources should already be memoized (see
/// [`gauntlet_vars::MemoizedSource`]) — the resolver queries them once
/// per test.
#[derive(Default)]
pub struct Resolver {
    sys_source: Option<Arc<dyn VariableSource>>,
    pav_source: Option<Arc<dyn VariableSource>>,
    sched_sources: HashMap<String, Arc<dyn VariableSource>>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system variable source (`sys` category).
    pub fn with_sys_source(mut self, source: Arc<dyn VariableSource>) -> Self {
        self.sys_source = Some(source);
        self
    }

    /// Set the framework variable source (`pav` category).
    pub fn with_pav_source(mut self, source: Arc<dyn VariableSource>) -> Self {
        self.pav_source = Some(source);
        self
    }

    /// Register a scheduler's variable source (`sched` category).
    pub fn with_scheduler(
        mut self,
        name: impl Into<String>,
        source: Arc<dyn VariableSource>,
    ) -> Self {
        self.sched_sources.insert(name.into(), source);
        self
    }

    /// Resolve a suite of raw test configs.
    ///
    /// * `suite` — test name → raw config, from the external loader.
    /// * `suite_path` — for error reporting.
    /// * `host` — host config layered under every test.
    /// * `modes` — mode configs layered over each test, in order.
    /// * `overrides` — CLI `key=value` overrides, applied last.
    /// * `requested` — specific test names, or `None` for the whole suite
    ///   (which excludes hidden tests).
    pub fn load(
        &self,
        suite: &IndexMap<String, ConfigValue>,
        suite_path: &str,
        host: Option<&ConfigValue>,
        modes: &[ConfigValue],
        overrides: &[String],
        requested: Option<&[&str]>,
    ) -> ResolveReport {
        let mut report = ResolveReport::default();

        // Host config forms the base every inheritance chain bottoms out
        // in.
        let mut base = ConfigValue::map();
        if let Some(host_cfg) = host {
            base = merge(&base, host_cfg);
            fold_cmd_extensions(&mut base);
        }

        let tests = match resolve_inheritance(&base, suite, suite_path) {
            Ok(tests) => tests,
            Err(error) => {
                // Without inheritance nothing in the suite is usable.
                report.failures.push(TestFailure {
                    suite_path: suite_path.to_string(),
                    test: "<suite>".to_string(),
                    error,
                });
                return report;
            }
        };

        let picked: Vec<(&String, &ConfigValue)> = match requested {
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let found = tests.get_key_value(*name);
                    if found.is_none() {
                        report.failures.push(TestFailure {
                            suite_path: suite_path.to_string(),
                            test: name.to_string(),
                            error: ResolveError::Inheritance {
                                suite_path: suite_path.to_string(),
                                message: format!("the suite has no test named '{}'", name),
                            },
                        });
                    }
                    found
                })
                .collect(),
            None => tests
                .iter()
                .filter(|(name, _)| !is_hidden(name))
                .collect(),
        };

        for (test_name, test_cfg) in picked {
            match self.resolve_one(test_name, test_cfg, suite_path, modes, overrides) {
                Ok(mut resolved) => report.configs.append(&mut resolved),
                Err(error) => {
                    warn!(test = %test_name, %error, "test failed to resolve");
                    report.failures.push(TestFailure {
                        suite_path: suite_path.to_string(),
                        test: test_name.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    /// Resolve one test into its permutations.
    fn resolve_one(
        &self,
        test_name: &str,
        test_cfg: &ConfigValue,
        suite_path: &str,
        modes: &[ConfigValue],
        overrides: &[String],
    ) -> Result<Vec<ResolvedConfig>, ResolveError> {
        let mut config = test_cfg.clone();
        for mode in modes {
            config = merge(&config, mode);
            fold_cmd_extensions(&mut config);
        }

        apply_overrides(&mut config, overrides)?;

        let base_var_man = self.build_variable_manager(&config)?;

        let (config, permutations) = resolve_permutations(&config, &base_var_man)?;

        debug!(
            test = %test_name,
            permutations = permutations.len(),
            "resolving test"
        );

        let mut resolved_configs = Vec::with_capacity(permutations.len());
        for (key, mut var_man) in permutations {
            resolve_references(&mut var_man)?;

            let values = resolve_test_vars(&config, &var_man)?;
            let skipped = check_skip(&values);

            resolved_configs.push(ResolvedConfig {
                name: test_name.to_string(),
                suite_path: suite_path.to_string(),
                values,
                permutation: key,
                var_man,
                hidden: is_hidden(test_name),
                skipped,
            });
        }

        Ok(resolved_configs)
    }

    /// Assemble the four variable sets for one test.
    fn build_variable_manager(
        &self,
        config: &ConfigValue,
    ) -> Result<VariableSetManager, ResolveError> {
        let mut var_man = VariableSetManager::new();

        let mut var_set = VariableSet::new(SetName::Var);
        if let Some(variables) = config.get("variables") {
            let map = variables.as_map().ok_or_else(|| ResolveError::BadStructure {
                key_path: "variables".to_string(),
                message: "the variables section must be a mapping".to_string(),
            })?;
            for (name, value) in map {
                let list = config_var_to_list(name, value)?;
                var_set.insert(name.clone(), list)?;
            }
        }
        var_man.add_var_set(var_set)?;

        let sys_set = match &self.sys_source {
            Some(source) => VariableSet::from_source(SetName::Sys, source.as_ref(), true)?,
            None => VariableSet::new(SetName::Sys),
        };
        var_man.add_var_set(sys_set)?;

        let pav_set = match &self.pav_source {
            Some(source) => VariableSet::from_source(SetName::Pav, source.as_ref(), true)?,
            None => VariableSet::new(SetName::Pav),
        };
        var_man.add_var_set(pav_set)?;

        let sched_set = match config.get("scheduler").and_then(ConfigValue::as_str) {
            Some(scheduler) => {
                let source = self.sched_sources.get(scheduler).ok_or_else(|| {
                    ResolveError::BadStructure {
                        key_path: "scheduler".to_string(),
                        message: format!("unknown scheduler '{}'", scheduler),
                    }
                })?;
                VariableSet::from_source(SetName::Sched, source.as_ref(), true)?
            }
            None => VariableSet::new(SetName::Sched),
        };
        var_man.add_var_set(sched_set)?;

        Ok(var_man)
    }
}

/// Convert a raw `variables` entry into a value list.
///
/// Accepted shapes: a string, a mapping, a list of strings, or a list of
/// mappings (all values strings).
fn config_var_to_list(name: &str, value: &ConfigValue) -> Result<VariableList, ResolveError> {
    let items: Vec<&ConfigValue> = match value {
        ConfigValue::List(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut values = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let value = match item {
            ConfigValue::Str(s) => VarValue::Scalar(s.clone()),
            ConfigValue::Map(map) => {
                let mut pairs = IndexMap::new();
                for (key, item_value) in map {
                    let s = item_value.as_str().ok_or_else(|| ResolveError::BadStructure {
                        key_path: format!("variables.{}.{}.{}", name, index, key),
                        message: "variable sub-values must be strings".to_string(),
                    })?;
                    pairs.insert(key.clone(), s.to_string());
                }
                VarValue::Map(pairs)
            }
            ConfigValue::List(_) => {
                return Err(ResolveError::BadStructure {
                    key_path: format!("variables.{}.{}", name, index),
                    message: "variable values can't be nested lists".to_string(),
                })
            }
        };
        values.push(value);
    }

    VariableList::new(name, values).map_err(ResolveError::from)
}
