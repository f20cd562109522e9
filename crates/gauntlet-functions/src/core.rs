//! Core expression functions.
//!
//! The baseline set every installation has: numeric conversions and
//! rounding, list reductions, and `len`. All pure.

use crate::{Arity, FunctionDescriptor, FunctionError, FUNCTIONS};
use gauntlet_ast::Value;
use linkme::distributed_slice;

fn bad_arg(func: &'static str, message: impl Into<String>) -> FunctionError {
    FunctionError::BadArg {
        func,
        message: message.into(),
    }
}

/// Numeric view of an argument, rejecting everything else.
fn numeric(func: &'static str, value: &Value) -> Result<f64, FunctionError> {
    value
        .as_f64()
        .ok_or_else(|| bad_arg(func, format!("expected a number, got {}", value.type_name())))
}

#[distributed_slice(FUNCTIONS)]
static INT: FunctionDescriptor = FunctionDescriptor {
    name: "int",
    signature: "int(value, base) -> int",
    doc: "Convert a string to an integer in the given base.",
    arity: Arity::Fixed(2),
    call: |args| {
        let base = args[1]
            .as_i64()
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| bad_arg("int", "base must be an integer from 2 to 36"))?;
        let text = match &args[0] {
            Value::Str(s) => s.trim(),
            Value::Int(i) if base == 10 => return Ok(Value::Int(*i)),
            other => {
                return Err(bad_arg(
                    "int",
                    format!("expected a string, got {}", other.type_name()),
                ))
            }
        };
        i64::from_str_radix(text, base as u32)
            .map(Value::Int)
            .map_err(|_| bad_arg("int", format!("'{}' is not a base-{} integer", text, base)))
    },
};

#[distributed_slice(FUNCTIONS)]
static ROUND: FunctionDescriptor = FunctionDescriptor {
    name: "round",
    signature: "round(float) -> int",
    doc: "Round a number to the nearest integer.",
    arity: Arity::Fixed(1),
    call: |args| {
        let x = numeric("round", &args[0])?;
        Ok(Value::Int(x.round() as i64))
    },
};

#[distributed_slice(FUNCTIONS)]
static FLOOR: FunctionDescriptor = FunctionDescriptor {
    name: "floor",
    signature: "floor(float) -> int",
    doc: "Round a number down to the nearest integer.",
    arity: Arity::Fixed(1),
    call: |args| {
        let x = numeric("floor", &args[0])?;
        Ok(Value::Int(x.floor() as i64))
    },
};

#[distributed_slice(FUNCTIONS)]
static CEIL: FunctionDescriptor = FunctionDescriptor {
    name: "ceil",
    signature: "ceil(float) -> int",
    doc: "Round a number up to the nearest integer.",
    arity: Arity::Fixed(1),
    call: |args| {
        let x = numeric("ceil", &args[0])?;
        Ok(Value::Int(x.ceil() as i64))
    },
};

#[distributed_slice(FUNCTIONS)]
static SUM: FunctionDescriptor = FunctionDescriptor {
    name: "sum",
    signature: "sum(list) -> int or float",
    doc: "Sum a list of numbers. The result is an int when every element is one.",
    arity: Arity::Fixed(1),
    call: |args| sum_impl("sum", &args[0]),
};

fn sum_impl(func: &'static str, arg: &Value) -> Result<Value, FunctionError> {
    let items = match arg {
        Value::List(items) => items,
        other => {
            return Err(bad_arg(
                func,
                format!("expected a list, got {}", other.type_name()),
            ))
        }
    };

    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut all_ints = true;
    for item in items {
        match item {
            Value::Int(i) => int_total += i,
            Value::Bool(b) => int_total += *b as i64,
            Value::Float(f) => {
                all_ints = false;
                float_total += f;
            }
            other => {
                return Err(bad_arg(
                    func,
                    format!("expected numbers, got {}", other.type_name()),
                ))
            }
        }
    }

    if all_ints {
        Ok(Value::Int(int_total))
    } else {
        Ok(Value::Float(float_total + int_total as f64))
    }
}

#[distributed_slice(FUNCTIONS)]
static AVG: FunctionDescriptor = FunctionDescriptor {
    name: "avg",
    signature: "avg(list) -> float",
    doc: "Average a list of numbers.",
    arity: Arity::Fixed(1),
    call: |args| {
        let items = match &args[0] {
            Value::List(items) if !items.is_empty() => items,
            Value::List(_) => return Err(bad_arg("avg", "cannot average an empty list")),
            other => {
                return Err(bad_arg(
                    "avg",
                    format!("expected a list, got {}", other.type_name()),
                ))
            }
        };
        let mut total = 0.0;
        for item in items {
            total += numeric("avg", item)?;
        }
        Ok(Value::Float(total / items.len() as f64))
    },
};

#[distributed_slice(FUNCTIONS)]
static LEN: FunctionDescriptor = FunctionDescriptor {
    name: "len",
    signature: "len(list or string) -> int",
    doc: "Number of elements in a list, or characters in a string.",
    arity: Arity::Fixed(1),
    call: |args| match &args[0] {
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(bad_arg(
            "len",
            format!("expected a list or string, got {}", other.type_name()),
        )),
    },
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call;

    fn list(values: &[i64]) -> Value {
        Value::List(values.iter().map(|&i| Value::Int(i)).collect())
    }

    #[test]
    fn test_int() {
        assert_eq!(
            call("int", &[Value::Str("ff".to_string()), Value::Int(16)]).unwrap(),
            Value::Int(255)
        );
        assert!(call("int", &[Value::Str("zz".to_string()), Value::Int(10)]).is_err());
        assert!(call("int", &[Value::Str("5".to_string()), Value::Int(40)]).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Int(3));
        assert_eq!(call("floor", &[Value::Float(2.9)]).unwrap(), Value::Int(2));
        assert_eq!(call("ceil", &[Value::Float(2.1)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_sum() {
        assert_eq!(call("sum", &[list(&[1, 2, 3])]).unwrap(), Value::Int(6));
        assert_eq!(
            call("sum", &[Value::List(vec![Value::Int(1), Value::Float(0.5)])]).unwrap(),
            Value::Float(1.5)
        );
        assert!(call("sum", &[Value::Int(3)]).is_err());
    }

    #[test]
    fn test_avg() {
        assert_eq!(
            call("avg", &[list(&[1, 2, 3, 4])]).unwrap(),
            Value::Float(2.5)
        );
        assert!(call("avg", &[Value::List(vec![])]).is_err());
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", &[list(&[1, 2, 3])]).unwrap(), Value::Int(3));
        assert_eq!(
            call("len", &[Value::Str("abcd".to_string())]).unwrap(),
            Value::Int(4)
        );
        assert!(call("len", &[Value::Int(3)]).is_err());
    }
}
