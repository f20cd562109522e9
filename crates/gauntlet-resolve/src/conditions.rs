//! Skip-condition evaluation.
//!
//! `only_if` and `not_if` are mappings whose keys and values are both
//! templates, resolved during phase 1. The decision here works on the
//! resolved strings:
//!
//! - `only_if`: the test runs only if *every* key matches at least one of
//!   its values.
//! - `not_if`: the test is skipped if *any* key matches any of its values.

use crate::config::ResolvedValue;

/// Check a resolved config's skip conditions.
///
/// Returns the reason the test should be skipped, or `None` to run it.
pub fn check_skip(resolved: &ResolvedValue) -> Option<String> {
    if let Some(not_if) = resolved.get("not_if").and_then(ResolvedValue::as_map) {
        for (key, values) in not_if {
            for value in condition_values(values) {
                if key == &value {
                    return Some(format!(
                        "not_if condition matched: '{}' == '{}'",
                        key, value
                    ));
                }
            }
        }
    }

    if let Some(only_if) = resolved.get("only_if").and_then(ResolvedValue::as_map) {
        for (key, values) in only_if {
            let values = condition_values(values);
            if !values.iter().any(|value| key == value) {
                return Some(format!(
                    "only_if condition unmatched: '{}' is none of {:?}",
                    key, values
                ));
            }
        }
    }

    None
}

/// The comparison values of one condition entry (a string or a list).
fn condition_values(value: &ResolvedValue) -> Vec<String> {
    match value {
        ResolvedValue::Leaf(_) => value.as_str().map(str::to_string).into_iter().collect(),
        ResolvedValue::List(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        ResolvedValue::Map(_) => Vec::new(),
    }
}
