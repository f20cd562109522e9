//! Command-line config overrides.
//!
//! Overrides arrive as `key.path=value` strings. The key path is walked
//! through the raw config (integer parts index lists); the value is
//! parsed as JSON when it is valid JSON, otherwise taken as a plain
//! string, and normalized so every leaf is a string.

use crate::config::ConfigValue;
use crate::error::ResolveError;
use indexmap::IndexMap;

/// Keys that identify a test rather than configure it.
const NOT_OVERRIDABLE: &[&str] = &["name", "suite", "suite_path", "scheduler", "host", "modes"];

/// Apply a list of `key.path=value` overrides to a raw config.
pub fn apply_overrides(
    config: &mut ConfigValue,
    overrides: &[String],
) -> Result<(), ResolveError> {
    for override_str in overrides {
        apply_override(config, override_str)?;
    }
    Ok(())
}

fn apply_override(config: &mut ConfigValue, override_str: &str) -> Result<(), ResolveError> {
    let bad = |message: String| ResolveError::Override {
        override_str: override_str.to_string(),
        message,
    };

    let (key, value) = override_str
        .split_once('=')
        .ok_or_else(|| bad("must be in the form <key>=<value>".to_string()))?;

    let parts: Vec<&str> = key.trim().split('.').collect();
    if parts.is_empty() || parts[0].is_empty() {
        return Err(bad("empty key".to_string()));
    }
    if NOT_OVERRIDABLE.contains(&parts[0]) {
        return Err(bad(format!("the '{}' key can't be overridden", parts[0])));
    }

    let new_value = parse_value(value)
        .map_err(|message| bad(message))?;

    // Walk to the parent of the final part.
    let mut current = &mut *config;
    for (depth, part) in parts.iter().enumerate() {
        let last = depth == parts.len() - 1;
        match current {
            ConfigValue::List(items) => {
                let index: usize = part.parse().map_err(|_| {
                    bad(format!(
                        "'{}' indexes a list and must be an integer",
                        part
                    ))
                })?;
                if index >= items.len() {
                    return Err(bad(format!("index '{}' is out of range", index)));
                }
                if last {
                    items[index] = new_value;
                    return Ok(());
                }
                current = &mut items[index];
            }
            ConfigValue::Map(map) => {
                if last {
                    map.insert(part.to_string(), new_value);
                    return Ok(());
                }
                current = map.get_mut(*part).ok_or_else(|| {
                    bad(format!("there is no '{}' key to descend into", part))
                })?;
            }
            ConfigValue::Str(_) => {
                return Err(bad(format!(
                    "'{}' is a plain value; can't descend into it",
                    part
                )));
            }
        }
    }

    unreachable!("the last key part always returns");
}

/// Parse an override value: JSON if it parses as JSON, else a plain
/// string. Either way the result has only string leaves.
fn parse_value(value: &str) -> Result<ConfigValue, String> {
    match serde_json::from_str::<serde_json::Value>(value.trim()) {
        Ok(json) => normalize(json),
        Err(_) => Ok(ConfigValue::Str(value.trim().to_string())),
    }
}

fn normalize(value: serde_json::Value) -> Result<ConfigValue, String> {
    use serde_json::Value as Json;
    match value {
        Json::String(s) => Ok(ConfigValue::Str(s)),
        Json::Number(n) => Ok(ConfigValue::Str(n.to_string())),
        Json::Bool(b) => Ok(ConfigValue::Str(if b { "True" } else { "False" }.to_string())),
        Json::Array(items) => {
            let normalized: Result<Vec<ConfigValue>, String> =
                items.into_iter().map(normalize).collect();
            Ok(ConfigValue::List(normalized?))
        }
        Json::Object(map) => {
            let mut out = IndexMap::new();
            for (key, item) in map {
                out.insert(key, normalize(item)?);
            }
            Ok(ConfigValue::Map(out))
        }
        Json::Null => Err("null is not a valid override value".to_string()),
    }
}
