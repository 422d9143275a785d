//! Function registry for expression functions
//!
//! Built-in functions are described by a compile-time perfect hash map (phf) holding
//! their arity; callers can register additional native functions at runtime.
//! A runtime registration with the same name as a built-in takes precedence.

use crate::error::{Error, Result};
use crate::value::{as_index, compare, expect_decimal, from_decimal, render, type_name, values_equal};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use phf::phf_map;
use rust_decimal::Decimal;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a caller-supplied function
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Function metadata
#[derive(Debug, Clone, Copy)]
pub struct FunctionMetadata {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>, // None = unbounded
}

const MAX_RANGE_LEN: i64 = 100_000;

static BUILTINS: phf::Map<&'static str, FunctionMetadata> = phf_map! {
    // Existence and size
    "size" => FunctionMetadata { name: "size", min_args: 1, max_args: Some(1) },
    "isEmpty" => FunctionMetadata { name: "isEmpty", min_args: 1, max_args: Some(1) },
    "exists" => FunctionMetadata { name: "exists", min_args: 1, max_args: Some(1) },
    "coalesce" => FunctionMetadata { name: "coalesce", min_args: 1, max_args: None },
    "typeOf" => FunctionMetadata { name: "typeOf", min_args: 1, max_args: Some(1) },

    // String functions
    "upper" => FunctionMetadata { name: "upper", min_args: 1, max_args: Some(1) },
    "lower" => FunctionMetadata { name: "lower", min_args: 1, max_args: Some(1) },
    "trim" => FunctionMetadata { name: "trim", min_args: 1, max_args: Some(1) },
    "capitalize" => FunctionMetadata { name: "capitalize", min_args: 1, max_args: Some(1) },
    "contains" => FunctionMetadata { name: "contains", min_args: 2, max_args: Some(2) },
    "startsWith" => FunctionMetadata { name: "startsWith", min_args: 2, max_args: Some(2) },
    "endsWith" => FunctionMetadata { name: "endsWith", min_args: 2, max_args: Some(2) },
    "substring" => FunctionMetadata { name: "substring", min_args: 2, max_args: Some(3) },
    "indexOf" => FunctionMetadata { name: "indexOf", min_args: 2, max_args: Some(2) },
    "replace" => FunctionMetadata { name: "replace", min_args: 3, max_args: Some(3) },
    "split" => FunctionMetadata { name: "split", min_args: 2, max_args: Some(2) },
    "join" => FunctionMetadata { name: "join", min_args: 1, max_args: Some(2) },
    "matches" => FunctionMetadata { name: "matches", min_args: 2, max_args: Some(2) },
    "replaceMatches" => FunctionMetadata { name: "replaceMatches", min_args: 3, max_args: Some(3) },
    "escapeHtml" => FunctionMetadata { name: "escapeHtml", min_args: 1, max_args: Some(1) },
    "encodeUrl" => FunctionMetadata { name: "encodeUrl", min_args: 1, max_args: Some(1) },
    "decodeUrl" => FunctionMetadata { name: "decodeUrl", min_args: 1, max_args: Some(1) },
    "base64Encode" => FunctionMetadata { name: "base64Encode", min_args: 1, max_args: Some(1) },
    "base64Decode" => FunctionMetadata { name: "base64Decode", min_args: 1, max_args: Some(1) },

    // Collection functions
    "keys" => FunctionMetadata { name: "keys", min_args: 1, max_args: Some(1) },
    "values" => FunctionMetadata { name: "values", min_args: 1, max_args: Some(1) },
    "first" => FunctionMetadata { name: "first", min_args: 1, max_args: Some(1) },
    "last" => FunctionMetadata { name: "last", min_args: 1, max_args: Some(1) },
    "range" => FunctionMetadata { name: "range", min_args: 2, max_args: Some(2) },

    // Aggregates
    "min" => FunctionMetadata { name: "min", min_args: 1, max_args: None },
    "max" => FunctionMetadata { name: "max", min_args: 1, max_args: None },
    "sum" => FunctionMetadata { name: "sum", min_args: 1, max_args: Some(1) },

    // Conversion
    "toString" => FunctionMetadata { name: "toString", min_args: 1, max_args: Some(1) },
    "toNumber" => FunctionMetadata { name: "toNumber", min_args: 1, max_args: Some(1) },
    "toBoolean" => FunctionMetadata { name: "toBoolean", min_args: 1, max_args: Some(1) },
    "toJson" => FunctionMetadata { name: "toJson", min_args: 1, max_args: Some(2) },
    "parseJson" => FunctionMetadata { name: "parseJson", min_args: 1, max_args: Some(1) },

    // Temporal
    "now" => FunctionMetadata { name: "now", min_args: 0, max_args: Some(1) },
    "formatDate" => FunctionMetadata { name: "formatDate", min_args: 2, max_args: Some(2) },
};

/// Look up built-in metadata by name
pub fn builtin_metadata(name: &str) -> Option<&'static FunctionMetadata> {
    BUILTINS.get(name)
}

/// Registry of callable functions
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    custom: HashMap<String, NativeFunction>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.custom.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("custom", &names)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function, replacing any function of the same name
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(function));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || BUILTINS.contains_key(name)
    }

    /// Invoke a function by name
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        if let Some(function) = self.custom.get(name) {
            return function(args);
        }

        let meta = BUILTINS
            .get(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
        check_arity(meta, args.len())?;
        call_builtin(meta.name, args)
    }
}

fn check_arity(meta: &FunctionMetadata, count: usize) -> Result<()> {
    let too_many = meta.max_args.map(|max| count > max).unwrap_or(false);
    if count < meta.min_args || too_many {
        let expected = match meta.max_args {
            Some(max) if max == meta.min_args => format!("{}", max),
            Some(max) => format!("{} to {}", meta.min_args, max),
            None => format!("at least {}", meta.min_args),
        };
        return Err(Error::invalid_args(
            meta.name,
            format!("expected {} argument(s), got {}", expected, count),
        ));
    }
    Ok(())
}

fn call_builtin(name: &'static str, args: &[Value]) -> Result<Value> {
    match name {
        "size" => size(&args[0]),
        "isEmpty" => Ok(Value::Bool(is_empty(&args[0]))),
        "exists" => Ok(Value::Bool(!args[0].is_null())),
        "coalesce" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "typeOf" => Ok(Value::String(type_name(&args[0]).to_string())),

        "upper" => map_string(name, &args[0], |s| s.to_uppercase()),
        "lower" => map_string(name, &args[0], |s| s.to_lowercase()),
        "trim" => map_string(name, &args[0], |s| s.trim().to_string()),
        "capitalize" => map_string(name, &args[0], capitalize),
        "contains" => contains(&args[0], &args[1]),
        "startsWith" => string_test(name, args, |s, p| s.starts_with(p)),
        "endsWith" => string_test(name, args, |s, p| s.ends_with(p)),
        "substring" => substring(args),
        "indexOf" => index_of(&args[0], &args[1]),
        "replace" => {
            let s = expect_str(name, &args[0])?;
            Ok(Value::String(s.replace(&render(&args[1]), &render(&args[2]))))
        }
        "split" => {
            let s = expect_str(name, &args[0])?;
            let separator = render(&args[1]);
            if separator.is_empty() {
                return Ok(Value::Array(
                    s.chars().map(|c| Value::String(c.to_string())).collect(),
                ));
            }
            Ok(Value::Array(
                s.split(separator.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        "join" => {
            let items = expect_list(name, &args[0])?;
            let separator = args.get(1).map(render).unwrap_or_else(|| ",".to_string());
            let parts: Vec<String> = items.iter().map(render).collect();
            Ok(Value::String(parts.join(&separator)))
        }
        #[cfg(feature = "regex")]
        "matches" => {
            let s = expect_str(name, &args[0])?;
            Ok(Value::Bool(compile_regex(name, &args[1])?.is_match(s)))
        }
        #[cfg(feature = "regex")]
        "replaceMatches" => {
            let s = expect_str(name, &args[0])?;
            let regex = compile_regex(name, &args[1])?;
            let replacement = render(&args[2]);
            Ok(Value::String(regex.replace_all(s, replacement.as_str()).into_owned()))
        }
        #[cfg(feature = "html-escape")]
        "escapeHtml" => map_string(name, &args[0], |s| html_escape::encode_text(s).into_owned()),
        "encodeUrl" => map_string(name, &args[0], |s| urlencoding::encode(s).into_owned()),
        "decodeUrl" => {
            let s = expect_str(name, &args[0])?;
            urlencoding::decode(s)
                .map(|decoded| Value::String(decoded.into_owned()))
                .map_err(|e| Error::invalid_args(name, e.to_string()))
        }
        #[cfg(feature = "base64")]
        "base64Encode" => {
            use base64::{engine::general_purpose, Engine};
            map_string(name, &args[0], |s| general_purpose::STANDARD.encode(s))
        }
        #[cfg(feature = "base64")]
        "base64Decode" => {
            use base64::{engine::general_purpose, Engine};
            let s = expect_str(name, &args[0])?;
            let bytes = general_purpose::STANDARD
                .decode(s)
                .map_err(|e| Error::invalid_args(name, e.to_string()))?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|e| Error::invalid_args(name, e.to_string()))
        }

        "keys" => match &args[0] {
            Value::Object(map) => Ok(Value::Array(
                map.keys().map(|k| Value::String(k.clone())).collect(),
            )),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Err(type_mismatch(name, "an object", other)),
        },
        "values" => match &args[0] {
            Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Err(type_mismatch(name, "an object", other)),
        },
        "first" => Ok(expect_list(name, &args[0])?.first().cloned().unwrap_or(Value::Null)),
        "last" => Ok(expect_list(name, &args[0])?.last().cloned().unwrap_or(Value::Null)),
        "range" => range(&args[0], &args[1]),

        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "sum" => {
            let mut total = Decimal::ZERO;
            for item in expect_list(name, &args[0])? {
                let value = expect_decimal(item, name)?;
                total = total.checked_add(value).ok_or_else(|| {
                    Error::EvaluationError(format!("Arithmetic overflow in sum at {}", value))
                })?;
            }
            from_decimal(total)
        }

        "toString" => Ok(Value::String(render(&args[0]))),
        "toNumber" => to_number(&args[0]),
        "toBoolean" => to_boolean(&args[0]),
        "toJson" => {
            let pretty = matches!(args.get(1), Some(Value::Bool(true)));
            let text = if pretty {
                serde_json::to_string_pretty(&args[0])
            } else {
                serde_json::to_string(&args[0])
            };
            text.map(Value::String)
                .map_err(|e| Error::EvaluationError(e.to_string()))
        }
        "parseJson" => {
            let s = expect_str(name, &args[0])?;
            serde_json::from_str(s).map_err(|e| Error::invalid_args(name, e.to_string()))
        }

        "now" => {
            let format = match args.first() {
                Some(value) => Some(expect_str(name, value)?),
                None => None,
            };
            let now = Utc::now();
            match format {
                Some(format) => format_with(name, &now.naive_utc(), format),
                None => Ok(Value::String(now.to_rfc3339())),
            }
        }
        "formatDate" => {
            let text = expect_str(name, &args[0])?;
            let format = expect_str(name, &args[1])?;
            let parsed = parse_datetime(text)
                .ok_or_else(|| Error::invalid_args(name, format!("cannot parse date '{}'", text)))?;
            format_with(name, &parsed, format)
        }

        other => Err(Error::FunctionNotFound(format!(
            "{} (not enabled in this build)",
            other
        ))),
    }
}

fn type_mismatch(function: &str, expected: &str, found: &Value) -> Error {
    Error::TypeError(format!(
        "{}() expects {} but found {}",
        function,
        expected,
        type_name(found)
    ))
}

fn expect_str<'a>(function: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| type_mismatch(function, "a string", value))
}

fn expect_list<'a>(function: &str, value: &'a Value) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(&[]),
        other => Err(type_mismatch(function, "a list", other)),
    }
}

/// Apply a string mapping; `null` passes through unchanged
fn map_string(function: &str, value: &Value, f: impl Fn(&str) -> String) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::String(f(expect_str(function, value)?)))
}

fn string_test(function: &str, args: &[Value], f: impl Fn(&str, &str) -> bool) -> Result<Value> {
    let s = expect_str(function, &args[0])?;
    Ok(Value::Bool(f(s, &render(&args[1]))))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn size(value: &Value) -> Result<Value> {
    let len = match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(type_mismatch("size", "a string, list or object", other)),
    };
    Ok(Value::Number((len as u64).into()))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<Value> {
    let found = match haystack {
        Value::String(s) => s.contains(&render(needle)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::Object(map) => map.contains_key(&render(needle)),
        Value::Null => false,
        other => return Err(type_mismatch("contains", "a string, list or object", other)),
    };
    Ok(Value::Bool(found))
}

fn substring(args: &[Value]) -> Result<Value> {
    let s = expect_str("substring", &args[0])?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let start = as_index(&args[1])
        .ok_or_else(|| Error::invalid_args("substring", "start must be an integer"))?
        .clamp(0, len);
    let end = match args.get(2) {
        Some(value) => as_index(value)
            .ok_or_else(|| Error::invalid_args("substring", "end must be an integer"))?
            .clamp(start, len),
        None => len,
    };
    Ok(Value::String(chars[start as usize..end as usize].iter().collect()))
}

fn index_of(haystack: &Value, needle: &Value) -> Result<Value> {
    let index: i64 = match haystack {
        Value::String(s) => {
            let needle = render(needle);
            match s.find(&needle) {
                Some(byte_index) => s[..byte_index].chars().count() as i64,
                None => -1,
            }
        }
        Value::Array(items) => items
            .iter()
            .position(|item| values_equal(item, needle))
            .map(|i| i as i64)
            .unwrap_or(-1),
        other => return Err(type_mismatch("indexOf", "a string or list", other)),
    };
    Ok(Value::Number(index.into()))
}

fn range(start: &Value, end: &Value) -> Result<Value> {
    let start = as_index(start).ok_or_else(|| Error::invalid_args("range", "start must be an integer"))?;
    let end = as_index(end).ok_or_else(|| Error::invalid_args("range", "end must be an integer"))?;
    if end.saturating_sub(start) > MAX_RANGE_LEN {
        return Err(Error::invalid_args(
            "range",
            format!("range larger than {} elements", MAX_RANGE_LEN),
        ));
    }
    Ok(Value::Array((start..end).map(|i| Value::Number(i.into())).collect()))
}

fn extreme(function: &str, args: &[Value], wanted: Ordering) -> Result<Value> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    let mut best: Option<&Value> = None;
    for item in items {
        if item.is_null() {
            continue;
        }
        best = match best {
            Some(current) if compare(item, current)? != wanted => Some(current),
            _ => Some(item),
        };
    }
    if best.is_none() && !items.is_empty() && items.iter().all(Value::is_null) {
        tracing::trace!(function, "all arguments were null");
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn to_number(value: &Value) -> Result<Value> {
    match value {
        Value::Number(_) | Value::Null => Ok(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = trimmed
                .parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|_| Error::invalid_args("toNumber", format!("'{}' is not a number", s)))?;
            from_decimal(parsed)
        }
        Value::Bool(b) => Ok(Value::Number(i64::from(*b).into())),
        other => Err(type_mismatch("toNumber", "a string or number", other)),
    }
}

fn to_boolean(value: &Value) -> Result<Value> {
    match value {
        Value::Bool(_) | Value::Null => Ok(value.clone()),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(true))),
        other => Err(Error::invalid_args(
            "toBoolean",
            format!("cannot convert {} to boolean", other),
        )),
    }
}

#[cfg(feature = "regex")]
fn compile_regex(function: &str, pattern: &Value) -> Result<regex::Regex> {
    let pattern = expect_str(function, pattern)?;
    regex::Regex::new(pattern).map_err(|e| Error::invalid_args(function, e.to_string()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn format_with(function: &str, value: &NaiveDateTime, format: &str) -> Result<Value> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::invalid_args(
            function,
            format!("invalid date format '{}'", format),
        ));
    }
    Ok(Value::String(value.format(format).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        FunctionRegistry::new().call(name, args)
    }

    #[test]
    fn test_arity_is_checked() {
        let err = call("upper", &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
        assert!(call("coalesce", &[json!(null), json!(null), json!(3)]).is_ok());
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("upper", &[json!("abc")]).unwrap(), json!("ABC"));
        assert_eq!(call("capitalize", &[json!("hello")]).unwrap(), json!("Hello"));
        assert_eq!(call("substring", &[json!("hello"), json!(1), json!(3)]).unwrap(), json!("el"));
        assert_eq!(call("indexOf", &[json!("héllo"), json!("l")]).unwrap(), json!(2));
        assert_eq!(call("split", &[json!("a,b"), json!(",")]).unwrap(), json!(["a", "b"]));
        assert_eq!(call("join", &[json!([1, "x", true]), json!("-")]).unwrap(), json!("1-x-true"));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(call("sum", &[json!([1, 2.5, 3])]).unwrap(), json!(6.5));
        assert_eq!(call("max", &[json!([4, 9, 2])]).unwrap(), json!(9));
        assert_eq!(call("min", &[json!(4), json!(9), json!(2)]).unwrap(), json!(2));
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let err = call("sum", &[json!([5e28, 5e28])]).unwrap_err();
        assert!(matches!(err, Error::EvaluationError(message) if message.contains("overflow")));
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            call("formatDate", &[json!("2024-03-05"), json!("%d/%m/%Y")]).unwrap(),
            json!("05/03/2024")
        );
        assert!(call("formatDate", &[json!("2024-03-05"), json!("%Q")]).is_err());
    }

    #[test]
    fn test_custom_function_overrides_builtin() {
        let mut registry = FunctionRegistry::new();
        registry.register("upper", |_args: &[Value]| Ok(json!("custom")));
        assert_eq!(registry.call("upper", &[json!("x")]).unwrap(), json!("custom"));
    }
}
