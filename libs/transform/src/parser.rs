//! Template parser: decoded JSON document to [`Template`]
//!
//! Directive keys recognised on objects:
//!
//! | Key | Meaning |
//! |---|---|
//! | `@condition` | object guard |
//! | `@value` / `@falseValue` | object resolves to this node (guard true / false) |
//! | `@transform` | post-processes `@value`, `@falseValue` and `@resource` results |
//! | `@resource` (+ `@expressions`, `@resParams`) | object resolves to resource text |
//! | `@include` (+ `@params`) | object resolves to another template |
//! | `@for-each(var)` (+ `@for-each-condition`) | repeat the object per source element |
//! | `@set(var)` | bind the field value into the context |
//! | `@replace(tag)` | splice the field's object entries into the parent |
//!
//! Strings may carry an expression marker `@<type>: <expr>` with type `template`,
//! `expr`, `path` or `pathMulti`; unmarked strings containing `${` are templates.

use crate::error::{Error, Result};
use crate::model::{
    Expression, ExpressionKind, Field, FieldKind, ForEachLoop, IncludeSpec, ListNode,
    LoopSource, ObjectNode, ResourceSpec, Template, TemplateNode,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const KEY_CONDITION: &str = "@condition";
const KEY_VALUE: &str = "@value";
const KEY_FALSE_VALUE: &str = "@falseValue";
const KEY_TRANSFORM: &str = "@transform";
const KEY_RESOURCE: &str = "@resource";
const KEY_EXPRESSIONS: &str = "@expressions";
const KEY_RES_PARAMS: &str = "@resParams";
const KEY_INCLUDE: &str = "@include";
const KEY_PARAMS: &str = "@params";
const KEY_FOR_EACH_CONDITION: &str = "@for-each-condition";

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^@([\w-]+)\s*:\s*(.*)$").expect("marker regex must compile")
    })
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^@(for-each|set|replace)\((\w+)\)$").expect("directive regex must compile")
    })
}

/// Parse a JSON template document
pub fn parse_str(text: &str) -> Result<Template> {
    let value: Value = serde_json::from_str(text)?;
    parse_value(&value)
}

/// Parse a decoded template document
pub fn parse_value(value: &Value) -> Result<Template> {
    Ok(Template::new(parse_node(value, "")?))
}

fn parse_node(value: &Value, path: &str) -> Result<TemplateNode> {
    match value {
        Value::String(text) => parse_string(text, path),
        Value::Array(items) => parse_list(items, path).map(TemplateNode::List),
        Value::Object(map) => parse_object(map, path).map(|node| TemplateNode::Object(Box::new(node))),
        scalar => Ok(TemplateNode::Scalar(scalar.clone())),
    }
}

fn parse_string(text: &str, path: &str) -> Result<TemplateNode> {
    Ok(match parse_marker(text, path)? {
        Some(expression) => TemplateNode::Expression(expression),
        None if text.contains("${") => {
            TemplateNode::Expression(Expression::new(ExpressionKind::Template, text))
        }
        None => TemplateNode::Scalar(Value::String(text.to_string())),
    })
}

/// Recognise `@<type>: <expr>`; `None` when the text carries no marker
fn parse_marker(text: &str, path: &str) -> Result<Option<Expression>> {
    let Some(captures) = marker_pattern().captures(text) else {
        return Ok(None);
    };
    let marker = &captures[1];
    let kind = ExpressionKind::from_marker(marker).ok_or_else(|| {
        Error::parse(
            path,
            format!("invalid expression type '{}' in expression: {}", marker, text),
        )
    })?;
    Ok(Some(Expression::new(kind, captures[2].trim())))
}

/// Conditions, loop sources and loop conditions default to value expressions
fn parse_value_expression(text: &str, path: &str) -> Result<Option<Expression>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    if let Some(expression) = parse_marker(text, path)? {
        return Ok(Some(expression));
    }
    if text.contains("${") {
        return Err(Error::parse(
            path,
            format!(
                "'{}' is read as a value expression; drop the ${{...}} or mark it with '@template:'",
                text
            ),
        ));
    }
    Ok(Some(Expression::new(ExpressionKind::Value, text.trim())))
}

fn parse_condition(value: &Value, path: &str) -> Result<Option<Expression>> {
    match value {
        Value::String(text) => parse_value_expression(text, path),
        Value::Bool(true) | Value::Null => Ok(None),
        Value::Bool(false) => Ok(Some(Expression::new(ExpressionKind::Value, "false"))),
        other => Err(Error::parse(
            path,
            format!("condition must be a string or boolean but found {}", other),
        )),
    }
}

fn parse_list(items: &[Value], path: &str) -> Result<ListNode> {
    let mut list = ListNode::default();
    let mut start = 0;

    if let Some(Value::String(first)) = items.first() {
        if let Some(captures) = marker_pattern().captures(first) {
            if &captures[1] == "condition" {
                list.condition = parse_value_expression(&captures[2], path)?;
                start = 1;
            }
        }
    }

    for (index, item) in items[start..].iter().enumerate() {
        list.elements
            .push(parse_node(item, &format!("{}[{}]", path, index))?);
    }
    Ok(list)
}

fn require_string<'a>(value: &'a Value, path: &str, key: &str) -> Result<&'a str> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::parse(path, format!("{} expects a non-empty string", key)))
}

fn parse_object(map: &Map<String, Value>, path: &str) -> Result<ObjectNode> {
    let mut node = ObjectNode::default();

    for (key, value) in map {
        let field_path = format!("{}/{}", path, key);
        match key.as_str() {
            KEY_CONDITION => node.condition = parse_condition(value, &field_path)?,
            KEY_VALUE => node.value = Some(parse_node(value, &field_path)?),
            KEY_FALSE_VALUE => node.false_value = Some(parse_node(value, &field_path)?),
            KEY_TRANSFORM => node.transform = parse_transform(value, &field_path)?,
            KEY_RESOURCE => node.resource = Some(parse_resource(map, value, &field_path)?),
            KEY_INCLUDE => node.include = Some(parse_include(map, value, &field_path)?),
            KEY_PARAMS | KEY_EXPRESSIONS | KEY_RES_PARAMS | KEY_FOR_EACH_CONDITION => {}
            _ => {
                if let Some(captures) = directive_pattern().captures(key) {
                    let variable = captures[2].to_string();
                    match &captures[1] {
                        "for-each" => {
                            node.for_each = Some(parse_for_each(map, variable, value, &field_path)?);
                        }
                        "set" => node.fields.push(Field {
                            name: key.clone(),
                            name_expression: None,
                            value: parse_node(value, &field_path)?,
                            kind: FieldKind::Set(variable),
                        }),
                        _ => node.fields.push(Field {
                            name: key.clone(),
                            name_expression: None,
                            value: parse_node(value, &field_path)?,
                            kind: FieldKind::Replace(variable),
                        }),
                    }
                    continue;
                }

                let name_expression = match parse_marker(key, &field_path)? {
                    Some(expression) => Some(expression),
                    None if key.contains("${") => {
                        Some(Expression::new(ExpressionKind::Template, key.as_str()))
                    }
                    None => None,
                };
                if key.starts_with('@') && name_expression.is_none() {
                    return Err(Error::parse(
                        path,
                        format!("invalid transform attribute '{}'", key),
                    ));
                }
                node.fields.push(Field {
                    name: key.clone(),
                    name_expression,
                    value: parse_node(value, &field_path)?,
                    kind: FieldKind::Ordinary,
                });
            }
        }
    }

    check_sub_attributes(map, &node, path)?;
    Ok(node)
}

/// Sub-attributes are only meaningful next to the directive they modify
fn check_sub_attributes(map: &Map<String, Value>, node: &ObjectNode, path: &str) -> Result<()> {
    let orphans = [
        (KEY_PARAMS, node.include.is_some(), KEY_INCLUDE),
        (KEY_EXPRESSIONS, node.resource.is_some(), KEY_RESOURCE),
        (KEY_RES_PARAMS, node.resource.is_some(), KEY_RESOURCE),
        (KEY_FOR_EACH_CONDITION, node.for_each.is_some(), "@for-each(...)"),
    ];
    for (key, parent_present, parent) in orphans {
        if map.contains_key(key) && !parent_present {
            return Err(Error::parse(
                path,
                format!("'{}' is only valid together with '{}'", key, parent),
            ));
        }
    }
    Ok(())
}

fn parse_transform(value: &Value, path: &str) -> Result<Option<Expression>> {
    let Value::String(text) = value else {
        return Err(Error::parse(path, "@transform expects a string expression"));
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(match parse_marker(text, path)? {
        Some(expression) => expression,
        None => Expression::new(ExpressionKind::Template, text.as_str()),
    }))
}

fn parse_for_each(
    map: &Map<String, Value>,
    variable: String,
    value: &Value,
    path: &str,
) -> Result<ForEachLoop> {
    let source = match value {
        Value::String(text) => match parse_value_expression(text, path)? {
            Some(expression) => LoopSource::Expression(expression),
            None => LoopSource::Literal(Value::Null),
        },
        literal => LoopSource::Literal(literal.clone()),
    };
    let condition = match map.get(KEY_FOR_EACH_CONDITION) {
        Some(condition) => parse_condition(condition, &format!("{}/{}", path, KEY_FOR_EACH_CONDITION))?,
        None => None,
    };
    Ok(ForEachLoop {
        variable,
        source,
        condition,
    })
}

fn parse_resource(map: &Map<String, Value>, value: &Value, path: &str) -> Result<ResourceSpec> {
    let id = require_string(value, path, KEY_RESOURCE)?.to_string();
    let expressions = match map.get(KEY_EXPRESSIONS) {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(text)) => !text.eq_ignore_ascii_case("false"),
        _ => true,
    };
    let params = map
        .get(KEY_RES_PARAMS)
        .map(|params| parse_node(params, &format!("{}/{}", path, KEY_RES_PARAMS)))
        .transpose()?;
    Ok(ResourceSpec {
        id,
        expressions,
        params,
    })
}

fn parse_include(map: &Map<String, Value>, value: &Value, path: &str) -> Result<IncludeSpec> {
    let id = require_string(value, path, KEY_INCLUDE)?.to_string();
    let params = match map.get(KEY_PARAMS) {
        None | Some(Value::Null) => None,
        Some(params @ Value::Object(_)) => {
            Some(parse_node(params, &format!("{}/{}", path, KEY_PARAMS))?)
        }
        Some(_) => {
            return Err(Error::parse(
                path,
                "invalid params specified for @include, params must be an object",
            ))
        }
    };
    Ok(IncludeSpec { id, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<TemplateNode> {
        parse_value(&value).map(|template| template.root().clone())
    }

    fn object(value: Value) -> ObjectNode {
        match parse(value).unwrap() {
            TemplateNode::Object(node) => *node,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_strings() {
        assert_eq!(parse(json!("plain")).unwrap(), TemplateNode::Scalar(json!("plain")));
        assert_eq!(
            parse(json!("hi ${name}")).unwrap(),
            TemplateNode::Expression(Expression::new(ExpressionKind::Template, "hi ${name}"))
        );
        assert_eq!(
            parse(json!("@expr: a + 1")).unwrap(),
            TemplateNode::Expression(Expression::new(ExpressionKind::Value, "a + 1"))
        );
        assert_eq!(
            parse(json!("@pathMulti:/a/b")).unwrap(),
            TemplateNode::Expression(Expression::new(ExpressionKind::PathMulti, "/a/b"))
        );
    }

    #[test]
    fn test_unknown_marker_is_parse_error() {
        let err = parse(json!({"x": ["@fmarker: a"]})).unwrap_err();
        match err {
            Error::Parse { path, message } => {
                assert_eq!(path, "/x[0]");
                assert!(message.contains("fmarker"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_list_guard() {
        match parse(json!(["@condition: flag", 1, 2])).unwrap() {
            TemplateNode::List(list) => {
                assert_eq!(list.condition, Some(Expression::new(ExpressionKind::Value, "flag")));
                assert_eq!(list.elements.len(), 2);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_directives() {
        let node = object(json!({
            "@condition": "x > 1",
            "@for-each(item)": "items",
            "@for-each-condition": "item.enabled",
            "@set(total)": "@expr: 3",
            "@replace(extra)": {"a": 1},
            "name-${item.id}": "@expr: item",
            "plain": 1
        }));
        assert_eq!(node.condition, Some(Expression::new(ExpressionKind::Value, "x > 1")));
        let for_each = node.for_each.unwrap();
        assert_eq!(for_each.variable, "item");
        assert_eq!(
            for_each.source,
            LoopSource::Expression(Expression::new(ExpressionKind::Value, "items"))
        );
        assert!(for_each.condition.is_some());
        let kinds: Vec<_> = node.fields.iter().map(|f| f.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Set("total".into()),
                FieldKind::Replace("extra".into()),
                FieldKind::Ordinary,
                FieldKind::Ordinary,
            ]
        );
        assert!(node.fields[2].name_expression.is_some());
        assert!(node.fields[3].name_expression.is_none());
    }

    #[test]
    fn test_literal_loop_sources() {
        let node = object(json!({"@for-each(x)": [1, 2]}));
        assert_eq!(node.for_each.unwrap().source, LoopSource::Literal(json!([1, 2])));
        let node = object(json!({"@for-each(x)": 5}));
        assert_eq!(node.for_each.unwrap().source, LoopSource::Literal(json!(5)));
    }

    #[test]
    fn test_interpolated_loop_source_rejected() {
        let err = parse(json!({"@for-each(i)": "${xs}", "v": 1})).unwrap_err();
        assert!(matches!(&err, Error::Parse { path, .. } if path == "/@for-each(i)"));
        assert!(err.to_string().contains("read as a value expression"));

        let node = object(json!({"@for-each(i)": "@template: ${xs}"}));
        assert!(matches!(node.for_each.unwrap().source, LoopSource::Expression(_)));
        assert!(parse(json!({"@condition": "${flag}", "a": 1})).is_err());
    }

    #[test]
    fn test_unknown_directive_rejected() {
        assert!(matches!(parse(json!({"@bogus": 1})), Err(Error::Parse { .. })));
        assert!(matches!(parse(json!({"@params": {}})), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_resource_and_include() {
        let node = object(json!({
            "@resource": "greeting.txt",
            "@expressions": "false",
            "@resParams": {"who": "${name}"}
        }));
        let resource = node.resource.unwrap();
        assert_eq!(resource.id, "greeting.txt");
        assert!(!resource.expressions);
        assert!(resource.params.is_some());

        let node = object(json!({"@include": "part.json", "@params": {"a": 1}}));
        assert_eq!(node.include.unwrap().id, "part.json");

        assert!(parse(json!({"@include": "part.json", "@params": [1]})).is_err());
        assert!(parse(json!({"@include": 3})).is_err());
    }

    #[test]
    fn test_transform_defaults_to_template() {
        let node = object(json!({"@value": 1, "@transform": "v=${thisValue}"}));
        assert_eq!(
            node.transform,
            Some(Expression::new(ExpressionKind::Template, "v=${thisValue}"))
        );
    }
}
