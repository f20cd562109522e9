//! Runtime values produced by expression evaluation.
//!
//! Config leaves are strings before resolution and strings after, but the
//! expression language in between is typed: arithmetic is numeric-only,
//! logic uses truthiness, and wildcard references produce lists. [`Value`]
//! is that intermediate type.
//!
//! # Coercion
//!
//! Variable values are stored as strings. When one enters an expression it
//! is coerced to the type it *looks like*: an integer literal, then a float
//! literal, then exactly `True`/`False`, otherwise it stays a string. The
//! same rule applies uniformly to literals and variable values, so
//! `"3" + 1` is `4`, not a type error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value in the expression language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Produced by wildcard references (`people.*`) and list literals.
    /// Only list-aware functions and repeat sections consume these; a list
    /// reaching a template boundary is a value error.
    List(Vec<Value>),
}

impl Value {
    /// Coerce a raw string to the value it looks like.
    pub fn coerce(raw: &str) -> Value {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            // parse::<f64> accepts "inf", "nan", etc. Only treat strings
            // that look like numeric literals as floats.
            if raw
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
            {
                return Value::Float(f);
            }
        }
        match raw {
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            _ => Value::Str(raw.to_string()),
        }
    }

    /// Render the value back into its config-string form.
    ///
    /// Booleans render as `True`/`False` and whole floats keep a trailing
    /// `.0`, so a value that round-trips through an expression without
    /// being operated on renders the way it was written.
    pub fn render(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }

    /// Truthiness, for `and`/`or`/`not`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Whether this value is usable in arithmetic.
    ///
    /// Bools count as numbers (1/0), matching the coercion rules of the
    /// config language.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }

    /// Numeric view as f64. Only valid when `is_numeric()`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view, when the value is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            _ => None,
        }
    }

    /// A short name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Whether this is a scalar (usable at a template boundary).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::List(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}
