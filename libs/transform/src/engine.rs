//! Transform engine
//!
//! Walks a parsed [`Template`] against a [`Context`] and produces a
//! `serde_json::Value`. A resolved `None` means "no value": the producing node is
//! omitted from its parent object or list.
//!
//! Directive precedence on an object node:
//!
//! 1. `@for-each` (when the object is not already an iteration body)
//! 2. `@condition`, falling back to `@falseValue`
//! 3. `@value`
//! 4. `@resource`
//! 5. `@include`
//! 6. ordinary fields in declared order

use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::ExpressionEvaluator;
use crate::generator::Generator;
use crate::loader::{MemoryLoader, ResourceLoader};
use crate::model::{Expression, ExpressionKind, FieldKind, ListNode, ObjectNode, Template, TemplateNode};
use crate::repeat::KeySource;
use crate::state::TransformState;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tessera_expr::value::{render, type_name};
use tracing::debug;

/// Binding holding the value a `@transform` expression post-processes
pub const THIS_VALUE: &str = "thisValue";

/// Directive slots already handled by an enclosing step
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Consumed {
    pub condition: bool,
    pub for_each: bool,
}

impl Consumed {
    /// Inside a loop iteration both the loop and the object's condition were
    /// evaluated before the body
    pub(crate) const ITERATION: Consumed = Consumed {
        condition: true,
        for_each: true,
    };
}

/// Template transformation engine
///
/// The engine holds only immutable collaborators and caches, so a single
/// instance can serve concurrent `process` calls, each with its own context.
pub struct TransformEngine {
    pub(crate) evaluator: Arc<dyn ExpressionEvaluator>,
    pub(crate) loader: Arc<dyn ResourceLoader>,
    pub(crate) generator: Arc<dyn Generator>,
    pub(crate) includes: Mutex<LruCache<String, Arc<Template>>>,
    pub(crate) config: EngineConfig,
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder wiring configuration and collaborators
#[derive(Default)]
pub struct TransformEngineBuilder {
    config: EngineConfig,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    loader: Option<Arc<dyn ResourceLoader>>,
    generator: Option<Arc<dyn Generator>>,
}

impl TransformEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Share an evaluator with other owners (e.g. one that has custom functions registered)
    pub fn shared_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn build(self) -> Result<TransformEngine> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> TransformEngine {
        let config = self.config;
        let evaluator = self.evaluator.unwrap_or_else(|| {
            Arc::new(tessera_expr::Engine::with_options(tessera_expr::EngineOptions {
                cache_size: config.expression_cache_size,
                strict_templates: config.strict_templates,
            }))
        });
        let generator = self
            .generator
            .unwrap_or_else(|| Arc::from(config.format.generator(config.pretty)));
        let capacity = NonZeroUsize::new(config.template_cache_size).unwrap_or(NonZeroUsize::MIN);
        TransformEngine {
            evaluator,
            loader: self.loader.unwrap_or_else(|| Arc::new(MemoryLoader::new())),
            generator,
            includes: Mutex::new(LruCache::new(capacity)),
            config,
        }
    }
}

impl TransformEngine {
    /// Engine with default configuration, the built-in expression language and no resources
    pub fn new() -> Self {
        TransformEngineBuilder::default().assemble()
    }

    pub fn builder() -> TransformEngineBuilder {
        TransformEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Resolve a template against a context.
    ///
    /// Returns `Value::Null` when the template root itself was dropped (for
    /// example a root object whose `@condition` is false).
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    /// use tessera_transform::{MapContext, Template, TransformEngine};
    ///
    /// let template = Template::parse(r#"{"greeting": "hello ${name}"}"#).unwrap();
    /// let mut context = MapContext::new().with("name", json!("world"));
    /// let result = TransformEngine::new().process(&template, &mut context).unwrap();
    /// assert_eq!(result, json!({"greeting": "hello world"}));
    /// ```
    pub fn process(&self, template: &Template, context: &mut dyn Context) -> Result<Value> {
        let name = template.name().unwrap_or("<inline>");
        debug!(template = name, "processing template");
        let state = TransformState::root(self.generator.as_ref());
        let result = self.process_node(template.root(), context, &state)?;
        debug!(template = name, dropped = result.is_none(), "template processed");
        Ok(result.unwrap_or(Value::Null))
    }

    /// Resolve a template and serialize the result with the configured generator
    pub fn process_as_string(&self, template: &Template, context: &mut dyn Context) -> Result<String> {
        let value = self.process(template, context)?;
        self.generator.format(&value)
    }

    pub(crate) fn process_node(
        &self,
        node: &TemplateNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        match node {
            TemplateNode::Scalar(Value::Null) => Ok(None),
            TemplateNode::Scalar(value) => Ok(Some(value.clone())),
            TemplateNode::Expression(expression) => {
                Ok(non_null(self.evaluate(expression, ctx, state)?))
            }
            TemplateNode::List(list) => self.process_list(list, ctx, state),
            TemplateNode::Object(object) => {
                self.process_object(object, ctx, state, Consumed::default())
            }
        }
    }

    fn process_list(
        &self,
        list: &ListNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        if let Some(condition) = &list.condition {
            if !self.evaluate_condition(condition, ctx, &state.for_dyn_field("condition"))? {
                return Ok(None);
            }
        }

        let mut out = Vec::with_capacity(list.elements.len());
        for (index, element) in list.elements.iter().enumerate() {
            let element_state = state.for_index(index);
            match element {
                TemplateNode::Object(object) if object.for_each.is_some() => {
                    let bodies = self.repeat_expand(object, ctx, &element_state, KeySource::None)?;
                    out.extend(bodies.into_iter().map(|(_, body)| body));
                }
                _ => {
                    if let Some(value) = self.process_node(element, ctx, &element_state)? {
                        out.push(value);
                    }
                }
            }
        }
        Ok(Some(Value::Array(out)))
    }

    pub(crate) fn process_object(
        &self,
        object: &ObjectNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
        consumed: Consumed,
    ) -> Result<Option<Value>> {
        if object.for_each.is_some() && !consumed.for_each {
            let bodies = self.repeat_expand(object, ctx, state, KeySource::None)?;
            return Ok(Some(Value::Array(
                bodies.into_iter().map(|(_, body)| body).collect(),
            )));
        }

        if !consumed.condition {
            if let Some(condition) = &object.condition {
                if !self.evaluate_condition(condition, ctx, &state.for_dyn_field("condition"))? {
                    return match &object.false_value {
                        Some(node) => {
                            self.resolve_terminal(object, node, ctx, &state.for_dyn_field("falseValue"))
                        }
                        None => Ok(None),
                    };
                }
            }
        }

        if let Some(node) = &object.value {
            return self.resolve_terminal(object, node, ctx, &state.for_dyn_field("value"));
        }
        if let Some(resource) = &object.resource {
            let text = self.load_resource(resource, ctx, state)?;
            return self.apply_transform(object, Some(Value::String(text)), ctx, state);
        }
        if let Some(include) = &object.include {
            return self.process_include(include, ctx, state);
        }
        self.process_fields(object, ctx, state)
    }

    fn process_fields(
        &self,
        object: &ObjectNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        let mut container = state.new_object(object);
        let mut has_set_field = false;

        for field in &object.fields {
            let field_state = state.for_field(&field.name);

            // Fan-out: a looping object merges (key, body) pairs into this container
            if let TemplateNode::Object(child) = &field.value {
                if child.for_each.is_some() {
                    let keys = match &field.name_expression {
                        Some(expression) => KeySource::Expression(expression),
                        None => KeySource::Constant(&field.name),
                    };
                    for (key, body) in self.repeat_expand(child, ctx, &field_state, keys)? {
                        if let Some(key) = key {
                            field_state.set_field(field, &mut container, key, body);
                        }
                    }
                    continue;
                }
            }

            match &field.kind {
                FieldKind::Set(variable) => {
                    let attribute_state = field_state.with_attribute_mode(true);
                    let value = self.process_node(&field.value, ctx, &attribute_state)?;
                    ctx.set_value(variable, value.unwrap_or(Value::Null))?;
                    has_set_field = true;
                }
                FieldKind::Replace(_) => {
                    let Some(value) = self.process_node(&field.value, ctx, &field_state)? else {
                        continue;
                    };
                    match value {
                        Value::Object(entries) => {
                            field_state.inject_replace_entries(field, &mut container, entries)
                        }
                        other => {
                            return Err(Error::ReplaceNotObject {
                                path: field_state.path(),
                                found: type_name(&other),
                            })
                        }
                    }
                }
                FieldKind::Ordinary => {
                    let Some(value) = self.process_node(&field.value, ctx, &field_state)? else {
                        continue;
                    };
                    let key = match &field.name_expression {
                        Some(expression) => self.evaluate_key(expression, ctx, &field_state)?,
                        None => field.name.clone(),
                    };
                    field_state.set_field(field, &mut container, key, value);
                }
            }
        }

        if has_set_field && container.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::Object(container)))
    }

    /// Resolve `@value`/`@falseValue` and run the transform hook
    fn resolve_terminal(
        &self,
        object: &ObjectNode,
        node: &TemplateNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        let value = self.process_node(node, ctx, state)?;
        self.apply_transform(object, value, ctx, state)
    }

    pub(crate) fn apply_transform(
        &self,
        object: &ObjectNode,
        value: Option<Value>,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        let Some(transform) = &object.transform else {
            return Ok(value);
        };
        ctx.set_value(THIS_VALUE, value.unwrap_or(Value::Null))?;
        let result = self.evaluate(transform, ctx, &state.for_dyn_field("transform"))?;
        Ok(non_null(result))
    }

    /// Evaluate an expression node, wrapping failures with the breadcrumb
    pub(crate) fn evaluate(
        &self,
        expression: &Expression,
        ctx: &dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Value> {
        let name = state.path();
        let scope = ctx.as_scope();
        let text = expression.text.as_str();
        let result = match expression.kind {
            ExpressionKind::Template => self
                .evaluator
                .evaluate_template(&name, text, scope)
                .map(Value::String),
            ExpressionKind::Value => self.evaluator.evaluate_value(&name, text, scope),
            ExpressionKind::Path => self.evaluator.evaluate_path(&name, text, scope),
            ExpressionKind::PathMulti => self
                .evaluator
                .evaluate_path_multi(&name, text, scope)
                .map(Value::Array),
        };
        result.map_err(|source| wrap(name, expression, source))
    }

    /// Value expressions go through the evaluator's condition check; other kinds
    /// may also produce the strings `"true"`/`"false"`
    pub(crate) fn evaluate_condition(
        &self,
        expression: &Expression,
        ctx: &dyn Context,
        state: &TransformState<'_>,
    ) -> Result<bool> {
        if expression.kind == ExpressionKind::Value {
            let name = state.path();
            return self
                .evaluator
                .evaluate_condition(&name, &expression.text, ctx.as_scope())
                .map_err(|source| wrap(name, expression, source));
        }
        match self.evaluate(expression, ctx, state)? {
            Value::Bool(flag) => Ok(flag),
            Value::String(text) if text.trim() == "true" => Ok(true),
            Value::String(text) if text.trim() == "false" => Ok(false),
            other => Err(wrap(
                state.path(),
                expression,
                tessera_expr::Error::TypeError(format!(
                    "condition must evaluate to a boolean but found {}",
                    type_name(&other)
                )),
            )),
        }
    }

    /// Evaluate a computed field name
    pub(crate) fn evaluate_key(
        &self,
        expression: &Expression,
        ctx: &dyn Context,
        state: &TransformState<'_>,
    ) -> Result<String> {
        let key_state = state.for_dyn_field("name");
        match self.evaluate(expression, ctx, &key_state)? {
            Value::String(key) => Ok(key),
            Value::Null => Err(wrap(
                key_state.path(),
                expression,
                tessera_expr::Error::UndefinedValue(expression.text.clone()),
            )),
            other => Ok(render(&other)),
        }
    }

    /// Drop every cached included template
    pub fn clear_cache(&self) {
        self.includes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

fn wrap(path: String, expression: &Expression, source: tessera_expr::Error) -> Error {
    Error::Evaluation {
        path,
        expression: expression.text.clone(),
        source,
    }
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MapContext;
    use serde_json::json;

    fn run(template: &str, context: Value) -> Result<Value> {
        let template = Template::parse(template)?;
        let mut context = MapContext::from_value(context)?;
        TransformEngine::new().process(&template, &mut context)
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(run(r#"{"a": 1, "b": true, "c": "plain"}"#, json!(null)).unwrap(), json!({"a": 1, "b": true, "c": "plain"}));
    }

    #[test]
    fn test_null_fields_are_dropped() {
        assert_eq!(run(r#"{"a": null, "b": "@expr: missing"}"#, json!({})).unwrap(), json!({}));
    }

    #[test]
    fn test_false_condition_uses_false_value() {
        let template = r#"{"x": {"@condition": "n > 1", "@value": "big", "@falseValue": "small"}}"#;
        assert_eq!(run(template, json!({"n": 0})).unwrap(), json!({"x": "small"}));
        assert_eq!(run(template, json!({"n": 5})).unwrap(), json!({"x": "big"}));
    }

    #[test]
    fn test_template_condition_accepts_text_booleans() {
        let template = r#"{"x": {"@condition": "@template: ${flag}", "@value": 1}}"#;
        assert_eq!(run(template, json!({"flag": true})).unwrap(), json!({"x": 1}));
        assert_eq!(run(template, json!({"flag": false})).unwrap(), json!({}));
        assert!(matches!(
            run(template, json!({"flag": "yes"})),
            Err(Error::Evaluation { .. })
        ));
    }

    #[test]
    fn test_transform_hook_sees_this_value() {
        let template = r#"{"x": {"@value": "@expr: n", "@transform": "@expr: thisValue * 10"}}"#;
        assert_eq!(run(template, json!({"n": 4})).unwrap(), json!({"x": 40}));
    }

    #[test]
    fn test_transform_not_applied_to_field_objects() {
        let template = r#"{"x": {"a": 1, "@transform": "@expr: 'replaced'"}}"#;
        assert_eq!(run(template, json!({})).unwrap(), json!({"x": {"a": 1}}));
    }

    #[test]
    fn test_non_string_key_is_rendered() {
        let template = r#"{"@expr: n + 1": "v"}"#;
        assert_eq!(run(template, json!({"n": 1})).unwrap(), json!({"2": "v"}));
    }

    #[test]
    fn test_null_key_is_an_error() {
        let err = run(r#"{"@expr: nope": "v"}"#, json!({})).unwrap_err();
        assert_eq!(err.path(), Some("/@expr: nope#name"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_include_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            TransformEngine::builder().config(config).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_process_as_string_uses_generator() {
        let engine = TransformEngine::builder()
            .generator(crate::generator::JsonGenerator { pretty: false })
            .build()
            .unwrap();
        let template = Template::parse(r#"{"a": [1, 2]}"#).unwrap();
        let text = engine
            .process_as_string(&template, &mut MapContext::new())
            .unwrap();
        assert_eq!(text, r#"{"a":[1,2]}"#);
    }
}
