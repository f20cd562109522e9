//! External variable sources and the per-process memo cache.
//!
//! System and scheduler plugins supply variables the framework cannot know
//! on its own: host names, OS info, allocation sizes. Querying them may
//! mean shelling out, so lookups must be memoizable — an HPC host runs
//! thousands of permutations per invocation and each one reads the same
//! `sys` values.

use crate::list::VarValue;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;

/// A value answered by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// Concrete values, ready now.
    Ready(Vec<VarValue>),
    /// Unknowable until allocation; becomes a deferred variable.
    Deferred,
}

impl SourceValue {
    /// A single scalar, the common case for host-info variables.
    pub fn scalar(value: impl Into<String>) -> Self {
        SourceValue::Ready(vec![VarValue::Scalar(value.into())])
    }
}

/// A provider of variables for one category.
///
/// Implementations may be expensive or blocking; wrap them in
/// [`MemoizedSource`] before handing them to resolution.
pub trait VariableSource: Send + Sync {
    /// The names this source can answer, in a stable order.
    fn names(&self) -> Vec<String>;

    /// Look up one variable. `None` means the source doesn't provide it.
    fn get(&self, name: &str) -> Option<SourceValue>;
}

/// Memoizing wrapper around a [`VariableSource`].
///
/// Each name is computed at most once per process and the result shared by
/// every test that references it. The cache is keyed by variable name and
/// bound to this wrapper, not ambient global state.
pub struct MemoizedSource<S> {
    inner: S,
    cache: Mutex<HashMap<String, Option<SourceValue>>>,
}

impl<S: VariableSource> MemoizedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: VariableSource> VariableSource for MemoizedSource<S> {
    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn get(&self, name: &str) -> Option<SourceValue> {
        let mut cache = self.cache.lock().expect("memo cache poisoned");
        if let Some(cached) = cache.get(name) {
            trace!(name, "variable source cache hit");
            return cached.clone();
        }
        let value = self.inner.get(name);
        cache.insert(name.to_string(), value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl VariableSource for CountingSource {
        fn names(&self) -> Vec<String> {
            vec!["host_name".to_string()]
        }

        fn get(&self, name: &str) -> Option<SourceValue> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "host_name" => Some(SourceValue::scalar("node001")),
                _ => None,
            }
        }
    }

    #[test]
    fn test_memoization_computes_once() {
        let source = MemoizedSource::new(CountingSource {
            calls: AtomicUsize::new(0),
        });

        assert_eq!(source.get("host_name"), Some(SourceValue::scalar("node001")));
        assert_eq!(source.get("host_name"), Some(SourceValue::scalar("node001")));
        assert_eq!(source.get("missing"), None);
        assert_eq!(source.get("missing"), None);

        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
    }
}
