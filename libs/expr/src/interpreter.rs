//! Tree-walking interpreter for parsed value expressions

use crate::ast::{AstNode, BinaryOperator, LogicalOperator, UnaryOperator};
use crate::error::{Error, Result};
use crate::functions::FunctionRegistry;
use crate::scope::Scope;
use crate::value::{as_index, compare, expect_decimal, from_decimal, render, type_name, values_equal};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Evaluates AST nodes against a scope
pub struct Interpreter<'a> {
    scope: &'a dyn Scope,
    functions: &'a FunctionRegistry,
}

impl<'a> Interpreter<'a> {
    pub fn new(scope: &'a dyn Scope, functions: &'a FunctionRegistry) -> Self {
        Self { scope, functions }
    }

    pub fn evaluate(&self, node: &AstNode) -> Result<Value> {
        match node {
            AstNode::Literal(value) => Ok(value.clone()),
            AstNode::Identifier(name) => Ok(self.scope.lookup(name).unwrap_or(Value::Null)),
            AstNode::Member { target, name } => {
                let target = self.evaluate(target)?;
                member(&target, name)
            }
            AstNode::Index { target, index } => {
                let target = self.evaluate(target)?;
                let index = self.evaluate(index)?;
                index_into(&target, &index)
            }
            AstNode::Call { name, args } => {
                let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                self.functions.call(name, &values)
            }
            AstNode::Unary { operator, operand } => {
                let operand = self.evaluate(operand)?;
                unary(*operator, operand)
            }
            AstNode::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*operator, &left, &right)
            }
            AstNode::Logical {
                left,
                operator,
                right,
            } => {
                let keyword = match operator {
                    LogicalOperator::And => "and",
                    LogicalOperator::Or => "or",
                };
                let left = expect_bool(&self.evaluate(left)?, keyword)?;
                match (operator, left) {
                    (LogicalOperator::And, false) => Ok(Value::Bool(false)),
                    (LogicalOperator::Or, true) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Bool(expect_bool(&self.evaluate(right)?, keyword)?)),
                }
            }
            AstNode::Coalesce { left, right } => match self.evaluate(left)? {
                Value::Null => self.evaluate(right),
                value => Ok(value),
            },
            AstNode::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if expect_bool(&self.evaluate(condition)?, "?:")? {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }
            AstNode::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            AstNode::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::Object(map))
            }
        }
    }
}

pub(crate) fn expect_bool(value: &Value, operation: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(Error::TypeError(format!(
            "'{}' expects a boolean but found {}",
            operation,
            type_name(other)
        ))),
    }
}

fn member(target: &Value, name: &str) -> Result<Value> {
    match target {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(Error::TypeError(format!(
            "Cannot read '{}' of {}",
            name,
            type_name(other)
        ))),
    }
}

fn index_into(target: &Value, index: &Value) -> Result<Value> {
    match (target, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Array(items), _) => {
            let i = as_index(index).ok_or_else(|| {
                Error::TypeError(format!("List index must be an integer, found {}", type_name(index)))
            })?;
            let resolved = if i < 0 { items.len() as i64 + i } else { i };
            Ok(usize::try_from(resolved)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::String(s), _) => {
            let i = as_index(index).ok_or_else(|| {
                Error::TypeError(format!("String index must be an integer, found {}", type_name(index)))
            })?;
            Ok(usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        (other, index) => Err(Error::TypeError(format!(
            "Cannot index {} with {}",
            type_name(other),
            type_name(index)
        ))),
    }
}

fn unary(operator: UnaryOperator, operand: Value) -> Result<Value> {
    match operator {
        UnaryOperator::Not => Ok(Value::Bool(!expect_bool(&operand, "!")?)),
        UnaryOperator::Negate => from_decimal(-expect_decimal(&operand, "unary '-'")?),
    }
}

fn binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    let symbol = operator.symbol();
    match operator {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Subtract => arithmetic(left, right, symbol, |a, b| a.checked_sub(b)),
        BinaryOperator::Multiply => arithmetic(left, right, symbol, |a, b| a.checked_mul(b)),
        BinaryOperator::Divide => {
            reject_zero_divisor(right, symbol)?;
            arithmetic(left, right, symbol, |a, b| a.checked_div(b))
        }
        BinaryOperator::Modulo => {
            reject_zero_divisor(right, symbol)?;
            arithmetic(left, right, symbol, |a, b| a.checked_rem(b))
        }
        BinaryOperator::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOperator::LessThan => ordered(left, right, |o| o == Ordering::Less),
        BinaryOperator::LessThanOrEqual => ordered(left, right, |o| o != Ordering::Greater),
        BinaryOperator::GreaterThan => ordered(left, right, |o| o == Ordering::Greater),
        BinaryOperator::GreaterThanOrEqual => ordered(left, right, |o| o != Ordering::Less),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            let mut text = render(left);
            text.push_str(&render(right));
            Ok(Value::String(text))
        }
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => arithmetic(left, right, "+", |a, b| a.checked_add(b)),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    symbol: &str,
    op: impl Fn(Decimal, Decimal) -> Option<Decimal>,
) -> Result<Value> {
    let operation = format!("'{}'", symbol);
    let a = expect_decimal(left, &operation)?;
    let b = expect_decimal(right, &operation)?;
    let result = op(a, b).ok_or_else(|| {
        Error::EvaluationError(format!("Arithmetic overflow in {} {} {}", a, symbol, b))
    })?;
    from_decimal(result)
}

fn reject_zero_divisor(right: &Value, symbol: &str) -> Result<()> {
    if let Value::Number(n) = right {
        if n.as_f64() == Some(0.0) {
            return Err(Error::EvaluationError(format!("Division by zero in '{}'", symbol)));
        }
    }
    Ok(())
}

fn ordered(left: &Value, right: &Value, test: impl Fn(Ordering) -> bool) -> Result<Value> {
    Ok(Value::Bool(test(compare(left, right)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scope::MapScope;
    use serde_json::json;

    fn eval(expr: &str, scope: &MapScope) -> Result<Value> {
        let ast = Parser::new(expr).parse()?;
        let functions = FunctionRegistry::new();
        Interpreter::new(scope, &functions).evaluate(&ast)
    }

    #[test]
    fn test_member_access_on_missing_is_null() {
        let scope = MapScope::new().with("user", json!({"name": "Ada"}));
        assert_eq!(eval("user.name", &scope).unwrap(), json!("Ada"));
        assert_eq!(eval("user.age", &scope).unwrap(), json!(null));
        assert_eq!(eval("missing.deep.path", &scope).unwrap(), json!(null));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let scope = MapScope::new();
        assert_eq!(eval("0.1 + 0.2", &scope).unwrap(), json!(0.3));
        assert_eq!(eval("7 % 3", &scope).unwrap(), json!(1));
        assert_eq!(eval("10 / 4", &scope).unwrap(), json!(2.5));
        assert!(matches!(eval("1 / 0", &scope), Err(Error::EvaluationError(_))));
    }

    #[test]
    fn test_string_concatenation() {
        let scope = MapScope::new().with("n", json!(3));
        assert_eq!(eval("'k-' + n", &scope).unwrap(), json!("k-3"));
    }

    #[test]
    fn test_logical_requires_boolean() {
        let scope = MapScope::new().with("flag", json!("yes"));
        assert!(matches!(eval("flag && true", &scope), Err(Error::TypeError(_))));
        assert_eq!(eval("false && flag", &scope).unwrap(), json!(false));
    }

    #[test]
    fn test_negative_index_counts_from_end() {
        let scope = MapScope::new().with("xs", json!([1, 2, 3]));
        assert_eq!(eval("xs[-1]", &scope).unwrap(), json!(3));
        assert_eq!(eval("xs[5]", &scope).unwrap(), json!(null));
    }
}
