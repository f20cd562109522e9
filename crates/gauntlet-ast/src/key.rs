//! Dotted variable key paths.
//!
//! A variable reference is a dot-separated path of up to four parts:
//! `category.name.index_or_key.key`. Only the name is required; the
//! category is one of the four reserved set names, the index is numeric
//! (or `*` for all values), and the final part addresses a sub-key of a
//! mapping value. Interpretation against the actual variable sets happens
//! in the variable manager; this module only owns the path shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One segment of a variable key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySegment {
    /// An identifier segment (category, variable name, or sub-key).
    Name(String),
    /// A numeric index into a variable's value list.
    Index(usize),
    /// `*` — all values of the list.
    Wildcard,
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Name(name) => write!(f, "{}", name),
            KeySegment::Index(idx) => write!(f, "{}", idx),
            KeySegment::Wildcard => write!(f, "*"),
        }
    }
}

/// A parsed (but not yet resolved) variable key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarKey {
    pub segments: Vec<KeySegment>,
}

/// Errors from key path parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("empty variable name in key '{0}'")]
    EmptyPart(String),
    #[error("no variable name given")]
    Empty,
    #[error("variable reference '{0}' has too many parts (at most category.name.index.key)")]
    TooManyParts(String),
}

impl VarKey {
    /// Build a key from already-parsed segments.
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self { segments }
    }

    /// Parse a dotted key string like `sched.nodes.0.name`.
    ///
    /// Each part becomes a [`KeySegment::Index`] if it parses as an
    /// unsigned integer, [`KeySegment::Wildcard`] if it is `*`, and a
    /// [`KeySegment::Name`] otherwise. Length validation against the
    /// four-part limit happens here; semantic validation (does the
    /// category exist, is the index in range) happens at resolution.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        if key.is_empty() {
            return Err(KeyError::Empty);
        }

        let mut segments = Vec::new();
        for part in key.split('.') {
            if part.is_empty() {
                return Err(KeyError::EmptyPart(key.to_string()));
            }
            segments.push(match part {
                "*" => KeySegment::Wildcard,
                _ => match part.parse::<usize>() {
                    Ok(idx) => KeySegment::Index(idx),
                    Err(_) => KeySegment::Name(part.to_string()),
                },
            });
        }

        if segments.len() > 4 {
            return Err(KeyError::TooManyParts(key.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first segment's name, if it is a name.
    pub fn first_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(KeySegment::Name(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let key = VarKey::parse("nodes").unwrap();
        assert_eq!(key.segments, vec![KeySegment::Name("nodes".to_string())]);
    }

    #[test]
    fn test_parse_full() {
        let key = VarKey::parse("sched.nodes.0.name").unwrap();
        assert_eq!(
            key.segments,
            vec![
                KeySegment::Name("sched".to_string()),
                KeySegment::Name("nodes".to_string()),
                KeySegment::Index(0),
                KeySegment::Name("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_wildcard() {
        let key = VarKey::parse("people.*").unwrap();
        assert_eq!(
            key.segments,
            vec![
                KeySegment::Name("people".to_string()),
                KeySegment::Wildcard,
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(VarKey::parse(""), Err(KeyError::Empty));
        assert_eq!(
            VarKey::parse("a..b"),
            Err(KeyError::EmptyPart("a..b".to_string()))
        );
        assert!(matches!(
            VarKey::parse("a.b.c.d.e"),
            Err(KeyError::TooManyParts(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for key in ["nodes", "sched.nodes", "people.*.name", "var.x.3"] {
            assert_eq!(VarKey::parse(key).unwrap().to_string(), key);
        }
    }
}
