//! Expression evaluation.
//!
//! A pure tree-walk over a parsed [`Expr`] against a
//! [`VariableSetManager`]. Evaluation never raises for deferred values:
//! *deferred is viral* — if any operand of any operator or function call
//! is deferred, the whole result is deferred, and the decision about
//! whether that is acceptable belongs to the section policy in
//! [`crate::phases`].

use gauntlet_ast::{BinaryOp, CompareOp, Expr, ExprKind, Span, UnaryOp, Value};
use gauntlet_vars::{DeferredTag, VarLookup, VariableError, VariableSetManager};
use std::fmt;

/// Result of evaluating an expression (when no error occurred).
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    Ready(Value),
    Deferred(DeferredTag),
}

/// Category of evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Variable lookup failure (not found, bad index, bad sub-key).
    Variable,
    /// Illegal operand combination (e.g. string + int).
    Type,
    /// A legal-type value that can't be computed (division by zero,
    /// list at a scalar boundary, format failure).
    Value,
    /// Function dispatch or execution failure.
    Function,
}

/// Evaluation error with the span of the offending sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
    pub message: String,
}

impl EvalError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: EvalErrorKind::Type,
            span,
            message: message.into(),
        }
    }

    pub fn value(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: EvalErrorKind::Value,
            span,
            message: message.into(),
        }
    }

    pub fn variable(err: VariableError, span: Span) -> Self {
        Self {
            kind: EvalErrorKind::Variable,
            span,
            message: err.to_string(),
        }
    }

    /// Render message plus caret context into the original string.
    pub fn context(&self, source: &str) -> String {
        format!("{}\n{}", self.message, self.span.context(source))
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Evaluate an expression tree against a variable manager.
pub fn evaluate(expr: &Expr, var_man: &VariableSetManager) -> Result<Eval, EvalError> {
    match &expr.kind {
        ExprKind::IntLiteral(i) => Ok(Eval::Ready(Value::Int(*i))),
        ExprKind::FloatLiteral(x) => Ok(Eval::Ready(Value::Float(*x))),
        ExprKind::BoolLiteral(b) => Ok(Eval::Ready(Value::Bool(*b))),
        ExprKind::StringLiteral(s) => Ok(Eval::Ready(Value::Str(s.clone()))),

        ExprKind::ListLiteral(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match evaluate(item, var_man)? {
                    Eval::Ready(value) => values.push(value),
                    deferred @ Eval::Deferred(_) => return Ok(deferred),
                }
            }
            Ok(Eval::Ready(Value::List(values)))
        }

        ExprKind::Var(key) => match var_man.lookup(key) {
            Ok(VarLookup::Scalar(raw)) => Ok(Eval::Ready(Value::coerce(&raw))),
            Ok(VarLookup::List(raw_values)) => Ok(Eval::Ready(Value::List(
                raw_values.iter().map(|raw| Value::coerce(raw)).collect(),
            ))),
            Ok(VarLookup::Deferred(tag)) => Ok(Eval::Deferred(tag)),
            Err(err) => Err(EvalError::variable(err, expr.span)),
        },

        ExprKind::Unary { op, operand } => {
            let value = match evaluate(operand, var_man)? {
                Eval::Ready(value) => value,
                deferred @ Eval::Deferred(_) => return Ok(deferred),
            };
            match op {
                UnaryOp::Not => Ok(Eval::Ready(Value::Bool(!value.truthy()))),
                UnaryOp::Neg => match value {
                    Value::Int(i) => Ok(Eval::Ready(Value::Int(-i))),
                    Value::Float(x) => Ok(Eval::Ready(Value::Float(-x))),
                    Value::Bool(b) => Ok(Eval::Ready(Value::Int(-(b as i64)))),
                    other => Err(EvalError::type_error(
                        format!("non-numeric value in math operation ({})", other.type_name()),
                        operand.span,
                    )),
                },
            }
        }

        ExprKind::Binary { op, left, right } => {
            let lhs = match evaluate(left, var_man)? {
                Eval::Ready(value) => value,
                deferred @ Eval::Deferred(_) => {
                    // Still evaluate the right side so its errors surface,
                    // then stay deferred.
                    evaluate(right, var_man)?;
                    return Ok(deferred);
                }
            };
            let rhs = match evaluate(right, var_man)? {
                Eval::Ready(value) => value,
                deferred @ Eval::Deferred(_) => return Ok(deferred),
            };
            apply_binary(*op, lhs, rhs, left.span, right.span, expr.span).map(Eval::Ready)
        }

        ExprKind::Compare { first, rest } => {
            let mut prev = match evaluate(first, var_man)? {
                Eval::Ready(value) => value,
                deferred @ Eval::Deferred(_) => return Ok(deferred),
            };
            let mut prev_span = first.span;
            let mut acc = true;

            for (op, operand) in rest {
                let next = match evaluate(operand, var_man)? {
                    Eval::Ready(value) => value,
                    deferred @ Eval::Deferred(_) => return Ok(deferred),
                };
                if acc {
                    acc = compare(*op, &prev, &next, prev_span.merge(operand.span))?;
                }
                prev = next;
                prev_span = operand.span;
            }

            Ok(Eval::Ready(Value::Bool(acc)))
        }

        ExprKind::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            let mut deferred = None;
            for arg in args {
                match evaluate(arg, var_man)? {
                    Eval::Ready(value) => values.push(value),
                    Eval::Deferred(tag) => deferred = deferred.or(Some(tag)),
                }
            }
            if let Some(tag) = deferred {
                return Ok(Eval::Deferred(tag));
            }
            gauntlet_functions::call(name, &values)
                .map(Eval::Ready)
                .map_err(|err| EvalError {
                    kind: EvalErrorKind::Function,
                    span: expr.span,
                    message: err.to_string(),
                })
        }
    }
}

/// Whether a value acts as an integer in arithmetic.
fn integral(value: &Value) -> Option<i64> {
    value.as_i64()
}

fn require_numeric(value: &Value, span: Span) -> Result<f64, EvalError> {
    value.as_f64().ok_or_else(|| {
        EvalError::type_error(
            format!("non-numeric value in math operation ({})", value.type_name()),
            span,
        )
    })
}

/// Python-style floor division (quotient rounds toward negative infinity).
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Python-style modulus (result takes the divisor's sign).
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

fn apply_binary(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    left_span: Span,
    right_span: Span,
    span: Span,
) -> Result<Value, EvalError> {
    // Logic first: and/or work on any types via truthiness and return the
    // deciding operand.
    match op {
        BinaryOp::And => {
            return Ok(if lhs.truthy() { rhs } else { lhs });
        }
        BinaryOp::Or => {
            return Ok(if lhs.truthy() { lhs } else { rhs });
        }
        _ => {}
    }

    // Everything else is numeric-only.
    let lf = require_numeric(&lhs, left_span)?;
    let rf = require_numeric(&rhs, right_span)?;
    let ints = (integral(&lhs), integral(&rhs));

    let value = match op {
        BinaryOp::Add => match ints {
            (Some(a), Some(b)) => Value::Int(a + b),
            _ => Value::Float(lf + rf),
        },
        BinaryOp::Sub => match ints {
            (Some(a), Some(b)) => Value::Int(a - b),
            _ => Value::Float(lf - rf),
        },
        BinaryOp::Mul => match ints {
            (Some(a), Some(b)) => Value::Int(a * b),
            _ => Value::Float(lf * rf),
        },
        BinaryOp::Div => {
            if rf == 0.0 {
                return Err(EvalError::value("division by zero", span));
            }
            // True division always produces a float.
            Value::Float(lf / rf)
        }
        BinaryOp::FloorDiv => match ints {
            (Some(a), Some(b)) => {
                if b == 0 {
                    return Err(EvalError::value("division by zero", span));
                }
                Value::Int(floor_div(a, b))
            }
            _ => {
                if rf == 0.0 {
                    return Err(EvalError::value("division by zero", span));
                }
                Value::Float((lf / rf).floor())
            }
        },
        BinaryOp::Mod => match ints {
            (Some(a), Some(b)) => {
                if b == 0 {
                    return Err(EvalError::value("division by zero", span));
                }
                Value::Int(floor_mod(a, b))
            }
            _ => {
                if rf == 0.0 {
                    return Err(EvalError::value("division by zero", span));
                }
                Value::Float(lf - rf * (lf / rf).floor())
            }
        },
        BinaryOp::Pow => match ints {
            (Some(a), Some(b)) if b >= 0 => match u32::try_from(b).ok().and_then(|e| a.checked_pow(e)) {
                Some(result) => Value::Int(result),
                None => Value::Float(lf.powf(rf)),
            },
            _ => {
                let result = lf.powf(rf);
                if result.is_nan() && !lf.is_nan() && !rf.is_nan() {
                    return Err(EvalError::value("power expression has a complex result", span));
                }
                Value::Float(result)
            }
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    };

    Ok(value)
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value, span: Span) -> Result<bool, EvalError> {
    // Equality is defined across all types: numerics compare numerically,
    // other same-type values structurally, and mixed types are unequal.
    let equality = |a: &Value, b: &Value| -> bool {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        }
    };

    match op {
        CompareOp::Eq => Ok(equality(lhs, rhs)),
        CompareOp::Ne => Ok(!equality(lhs, rhs)),
        _ => {
            // Ordering needs two numbers or two strings.
            let ordering = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => {
                        return Err(EvalError::type_error(
                            format!(
                                "cannot order {} and {} values",
                                lhs.type_name(),
                                rhs.type_name()
                            ),
                            span,
                        ))
                    }
                },
            };
            let ordering = match ordering {
                Some(ordering) => ordering,
                // NaN comparisons are false, like the source language.
                None => return Ok(false),
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Ge => ordering.is_ge(),
                CompareOp::Eq | CompareOp::Ne => unreachable!("handled above"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_parser::parse_expression;
    use gauntlet_vars::{SetName, VariableList, VariableSet, VariableSetManager};

    fn var_man() -> VariableSetManager {
        let mut var = VariableSet::new(SetName::Var);
        var.insert_scalar("count", "3").unwrap();
        var.insert_scalar("name", "quartz").unwrap();
        var.insert(
            "people",
            VariableList::scalars(["Robert", "Suzy", "Yennifer"]).unwrap(),
        )
        .unwrap();

        let mut sched = VariableSet::new(SetName::Sched);
        sched.insert_deferred("nodes").unwrap();

        let mut man = VariableSetManager::new();
        man.add_var_set(var).unwrap();
        man.add_var_set(sched).unwrap();
        man
    }

    fn eval_str(src: &str) -> Eval {
        let expr = parse_expression(src).expect("parse failed");
        evaluate(&expr, &var_man()).expect("evaluation failed")
    }

    fn eval_value(src: &str) -> Value {
        match eval_str(src) {
            Eval::Ready(value) => value,
            Eval::Deferred(tag) => panic!("unexpectedly deferred on {}", tag),
        }
    }

    fn eval_err(src: &str) -> EvalError {
        let expr = parse_expression(src).expect("parse failed");
        evaluate(&expr, &var_man()).expect_err("expected evaluation error")
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_value("(3 ^ 2) - 4"), Value::Int(5));
        assert_eq!(eval_value("7 // 2"), Value::Int(3));
        assert_eq!(eval_value("-7 // 2"), Value::Int(-4));
        assert_eq!(eval_value("7 % 2"), Value::Int(1));
        assert_eq!(eval_value("-7 % 2"), Value::Int(1));
        assert_eq!(eval_value("1 / 2"), Value::Float(0.5));
    }

    #[test]
    fn test_variable_coercion() {
        // count is the string "3" but acts as a number.
        assert_eq!(eval_value("count + 1"), Value::Int(4));
    }

    #[test]
    fn test_string_plus_number_is_type_error() {
        let err = eval_err("name + 1");
        assert_eq!(err.kind, EvalErrorKind::Type);
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_err("1 / 0");
        assert_eq!(err.kind, EvalErrorKind::Value);
    }

    #[test]
    fn test_truthy_logic() {
        assert_eq!(eval_value("\"\" or \"fallback\""), Value::Str("fallback".to_string()));
        assert_eq!(eval_value("0 and 5"), Value::Int(0));
        assert_eq!(eval_value("not 0"), Value::Bool(true));
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval_value("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval_value("1 < 2 < 2"), Value::Bool(false));
    }

    #[test]
    fn test_unary_precedence() {
        // `not` binds tighter than comparison: (not 0) == True
        assert_eq!(eval_value("not 0 == True"), Value::Bool(true));
    }

    #[test]
    fn test_wildcard_and_len() {
        assert_eq!(eval_value("len(people.*)"), Value::Int(3));
    }

    #[test]
    fn test_deferred_is_viral() {
        assert!(matches!(eval_str("nodes + 1"), Eval::Deferred(_)));
        assert!(matches!(eval_str("1 + sched.nodes * 2"), Eval::Deferred(_)));
        assert!(matches!(eval_str("len([nodes])"), Eval::Deferred(_)));
        assert!(matches!(eval_str("nodes == 4"), Eval::Deferred(_)));
    }

    #[test]
    fn test_variable_not_found() {
        let err = eval_err("missing_var + 1");
        assert_eq!(err.kind, EvalErrorKind::Variable);
    }

    #[test]
    fn test_unknown_function() {
        let err = eval_err("bogus(1)");
        assert_eq!(err.kind, EvalErrorKind::Function);
    }

    #[test]
    fn test_int_pow_overflow_falls_back_to_float() {
        match eval_value("10 ^ 20") {
            Value::Float(f) => assert!(f > 1e19),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_root_is_error() {
        let err = eval_err("(0 - 8) ^ 0.5");
        assert_eq!(err.kind, EvalErrorKind::Value);
    }
}
