//! Parsed template strings.
//!
//! A template is the parsed form of one config string: a sequence of
//! literal runs, `{{ expression }}` blocks, and `[~ body ~sep]` repeat
//! sections. Repeat sections contain their own literal/expression
//! sequence but cannot nest further repeats.

use crate::expr::Expr;
use crate::span::Span;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A fully parsed template string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub items: Vec<TemplateItem>,
    /// The original string, kept for error context and idempotence checks.
    pub source: String,
}

impl Template {
    /// Whether the template contains any substitution at all.
    ///
    /// A template without substitutions resolves to its source unchanged.
    pub fn has_substitutions(&self) -> bool {
        self.items
            .iter()
            .any(|item| !matches!(item, TemplateItem::Literal(_)))
    }
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateItem {
    /// Literal text, already unescaped.
    Literal(String),
    /// A `{{ expression }}` block.
    Expr(ExprBlock),
    /// A `[~ body ~sep]` repeat section.
    Repeat(RepeatBlock),
}

/// An expression block with its optional format spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprBlock {
    pub expr: Expr,
    pub format: Option<FormatSpec>,
    /// Span of the whole block (including braces) in the template string.
    pub span: Span,
}

/// A repeat section: the body is resolved once per combination of the
/// multi-valued variables it references, joined by `separator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatBlock {
    pub items: Vec<TemplateItem>,
    pub separator: String,
    pub span: Span,
}

/// Presentation type for a format spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// `d` — integer
    Decimal,
    /// `f` — fixed-point float
    Fixed,
    /// `e` — scientific notation
    Scientific,
    /// `s` — string
    Str,
    /// `x` — lowercase hex integer
    Hex,
    /// `o` — octal integer
    Octal,
    /// `b` — binary integer
    Binary,
}

/// Alignment for padded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// A format spec suffix: `{{ expr:spec }}`.
///
/// Supports `[fill][<>^][0][width][.precision][type]` — the subset of the
/// formatting mini-language config files actually use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub fill: Option<char>,
    pub align: Option<Align>,
    pub zero_pad: bool,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub kind: Option<FormatKind>,
    /// The spec text as written, for error messages.
    pub raw: String,
}

/// Errors applying a format spec to a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid format spec '{0}'")]
    BadSpec(String),
    #[error("cannot format {value_type} value with '{spec}'")]
    BadValue {
        spec: String,
        value_type: &'static str,
    },
}

impl FormatSpec {
    /// Parse a format spec body (the text after the `:`).
    pub fn parse(raw: &str) -> Result<FormatSpec, FormatError> {
        let mut spec = FormatSpec {
            fill: None,
            align: None,
            zero_pad: false,
            width: None,
            precision: None,
            kind: None,
            raw: raw.to_string(),
        };

        let chars: Vec<char> = raw.chars().collect();
        let mut pos = 0;

        // [fill]align — fill is only recognized when followed by an align.
        if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
            spec.fill = Some(chars[0]);
            spec.align = Some(align_of(chars[1]));
            pos = 2;
        } else if !chars.is_empty() && matches!(chars[0], '<' | '>' | '^') {
            spec.align = Some(align_of(chars[0]));
            pos = 1;
        }

        if chars.get(pos) == Some(&'0') {
            spec.zero_pad = true;
            pos += 1;
        }

        let width_start = pos;
        while chars.get(pos).map(char::is_ascii_digit) == Some(true) {
            pos += 1;
        }
        if pos > width_start {
            let width: String = chars[width_start..pos].iter().collect();
            spec.width = width.parse().ok();
        }

        if chars.get(pos) == Some(&'.') {
            pos += 1;
            let prec_start = pos;
            while chars.get(pos).map(char::is_ascii_digit) == Some(true) {
                pos += 1;
            }
            if pos == prec_start {
                return Err(FormatError::BadSpec(raw.to_string()));
            }
            let precision: String = chars[prec_start..pos].iter().collect();
            spec.precision = precision.parse().ok();
        }

        if let Some(&c) = chars.get(pos) {
            spec.kind = Some(match c {
                'd' => FormatKind::Decimal,
                'f' => FormatKind::Fixed,
                'e' => FormatKind::Scientific,
                's' => FormatKind::Str,
                'x' => FormatKind::Hex,
                'o' => FormatKind::Octal,
                'b' => FormatKind::Binary,
                _ => return Err(FormatError::BadSpec(raw.to_string())),
            });
            pos += 1;
        }

        if pos != chars.len() {
            return Err(FormatError::BadSpec(raw.to_string()));
        }

        Ok(spec)
    }

    /// Apply the spec to a scalar value.
    pub fn apply(&self, value: &Value) -> Result<String, FormatError> {
        let body = self.render_body(value)?;

        let width = self.width.unwrap_or(0);
        if body.chars().count() >= width {
            return Ok(body);
        }

        let pad = width - body.chars().count();
        if self.zero_pad && self.align.is_none() {
            // Zero padding goes between the sign and the digits.
            let (sign, digits) = match body.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", body.as_str()),
            };
            return Ok(format!("{}{}{}", sign, "0".repeat(pad), digits));
        }

        let fill = self.fill.unwrap_or(' ');
        // Numbers right-align by default, strings left-align.
        let align = self.align.unwrap_or(if value.is_numeric() {
            Align::Right
        } else {
            Align::Left
        });
        Ok(match align {
            Align::Left => format!("{}{}", body, fill.to_string().repeat(pad)),
            Align::Right => format!("{}{}", fill.to_string().repeat(pad), body),
            Align::Center => {
                let left = pad / 2;
                let right = pad - left;
                format!(
                    "{}{}{}",
                    fill.to_string().repeat(left),
                    body,
                    fill.to_string().repeat(right)
                )
            }
        })
    }

    fn render_body(&self, value: &Value) -> Result<String, FormatError> {
        let bad_value = || FormatError::BadValue {
            spec: self.raw.clone(),
            value_type: value.type_name(),
        };

        match self.kind {
            None => match self.precision {
                Some(prec) => match value {
                    Value::Float(f) => Ok(format!("{:.*}", prec, f)),
                    Value::Int(i) => Ok(format!("{:.*}", prec, *i as f64)),
                    _ => Err(bad_value()),
                },
                None => Ok(value.render()),
            },
            Some(FormatKind::Str) => match value {
                Value::List(_) => Err(bad_value()),
                _ => Ok(value.render()),
            },
            Some(FormatKind::Decimal) => {
                let i = match value {
                    Value::Int(i) => *i,
                    Value::Bool(b) => *b as i64,
                    _ => return Err(bad_value()),
                };
                Ok(i.to_string())
            }
            Some(FormatKind::Hex) => value.as_i64().map(|i| format!("{:x}", i)).ok_or_else(bad_value),
            Some(FormatKind::Octal) => value.as_i64().map(|i| format!("{:o}", i)).ok_or_else(bad_value),
            Some(FormatKind::Binary) => value.as_i64().map(|i| format!("{:b}", i)).ok_or_else(bad_value),
            Some(FormatKind::Fixed) => {
                let f = value.as_f64().ok_or_else(bad_value)?;
                Ok(format!("{:.*}", self.precision.unwrap_or(6), f))
            }
            Some(FormatKind::Scientific) => {
                let f = value.as_f64().ok_or_else(bad_value)?;
                Ok(format!("{:.*e}", self.precision.unwrap_or(6), f))
            }
        }
    }
}

fn align_of(c: char) -> Align {
    match c {
        '<' => Align::Left,
        '>' => Align::Right,
        '^' => Align::Center,
        _ => unreachable!("caller checked the align character"),
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precision_float() {
        let spec = FormatSpec::parse(".2f").unwrap();
        assert_eq!(spec.precision, Some(2));
        assert_eq!(spec.kind, Some(FormatKind::Fixed));
        assert_eq!(spec.apply(&Value::Float(3.14159)).unwrap(), "3.14");
    }

    #[test]
    fn test_zero_pad_decimal() {
        let spec = FormatSpec::parse("03d").unwrap();
        assert_eq!(spec.apply(&Value::Int(5)).unwrap(), "005");
        assert_eq!(spec.apply(&Value::Int(-5)).unwrap(), "-05");
    }

    #[test]
    fn test_fill_align() {
        let spec = FormatSpec::parse("*^7").unwrap();
        assert_eq!(spec.apply(&Value::Str("ab".to_string())).unwrap(), "**ab***");
    }

    #[test]
    fn test_default_alignment() {
        let spec = FormatSpec::parse("5").unwrap();
        assert_eq!(spec.apply(&Value::Int(42)).unwrap(), "   42");
        assert_eq!(spec.apply(&Value::Str("ab".to_string())).unwrap(), "ab   ");
    }

    #[test]
    fn test_bad_specs() {
        assert!(FormatSpec::parse("q").is_err());
        assert!(FormatSpec::parse(".f").is_err());
        assert!(FormatSpec::parse("3dx").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let spec = FormatSpec::parse("d").unwrap();
        assert!(spec.apply(&Value::Str("a".to_string())).is_err());
    }
}
