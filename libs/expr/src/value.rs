//! Helpers over `serde_json::Value` used by the interpreter and functions
//!
//! Arithmetic goes through `rust_decimal` so that `0.1 + 0.2` renders as `0.3`.

use crate::error::{Error, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Short type name used in diagnostics
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Convert a JSON number to an exact decimal
pub fn to_decimal(number: &Number) -> Result<Decimal> {
    if let Some(i) = number.as_i64() {
        return Ok(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Ok(Decimal::from(u));
    }
    // Parse the shortest textual form so 0.1 stays 0.1 instead of its binary expansion
    let text = number.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| number.as_f64().and_then(Decimal::from_f64))
        .ok_or_else(|| Error::TypeError(format!("Number {} is out of range", number)))
}

/// Convert a decimal back to a JSON number, preferring integers when exact
pub fn from_decimal(value: Decimal) -> Result<Value> {
    let normalized = value.normalize();
    if normalized.fract().is_zero() {
        if let Some(i) = normalized.to_i64() {
            return Ok(Value::Number(i.into()));
        }
    }
    normalized
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| Error::EvaluationError(format!("Cannot represent {} as a number", value)))
}

/// Extract a decimal from a value or fail with a type error naming the operation
pub fn expect_decimal(value: &Value, operation: &str) -> Result<Decimal> {
    match value {
        Value::Number(n) => to_decimal(n),
        other => Err(Error::TypeError(format!(
            "{} expects a number but found {}",
            operation,
            type_name(other)
        ))),
    }
}

/// Render a value as text for template interpolation and string concatenation
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Equality with numeric normalization (`1 == 1.0`)
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (to_decimal(a), to_decimal(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => left == right,
    }
}

/// Ordering for comparison operators: numbers with numbers, strings with strings
pub fn compare(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(to_decimal(a)?.cmp(&to_decimal(b)?)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(Error::TypeError(format!(
            "Cannot compare {} with {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

/// Interpret a value as a list index, accepting integral numbers only
pub fn as_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .and_then(|f| f.to_i64())
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_round_trip_prefers_integers() {
        let d = to_decimal(&Number::from_f64(2.0).unwrap()).unwrap();
        assert_eq!(from_decimal(d).unwrap(), json!(2));
        let a = to_decimal(&Number::from_f64(0.1).unwrap()).unwrap();
        let b = to_decimal(&Number::from_f64(0.2).unwrap()).unwrap();
        assert_eq!(from_decimal(a + b).unwrap(), json!(0.3));
    }

    #[test]
    fn test_numeric_equality() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!([1, "a"]), &json!([1.0, "a"])));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&json!("x")), "x");
        assert_eq!(render(&json!(12)), "12");
        assert_eq!(render(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
