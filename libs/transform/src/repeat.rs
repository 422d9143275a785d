//! `@for-each` expansion

use crate::context::Context;
use crate::engine::{Consumed, TransformEngine};
use crate::error::{Error, Result};
use crate::model::{Expression, ForEachLoop, LoopSource, ObjectNode};
use crate::state::TransformState;
use serde_json::Value;
use tracing::trace;

/// Where the key of each iteration comes from
#[derive(Debug, Clone, Copy)]
pub(crate) enum KeySource<'t> {
    /// List position: bodies only
    None,
    /// Fan-out field without a computed name; every iteration maps to the same key
    Constant(&'t str),
    /// Fan-out field with a computed name, evaluated after each iteration
    Expression(&'t Expression),
}

impl TransformEngine {
    /// Expand a looping object into its iteration results in source order.
    ///
    /// Each iteration processes the same immutable node with the loop and the
    /// object's condition marked as consumed. Iterations whose body resolves to
    /// nothing are skipped.
    pub(crate) fn repeat_expand(
        &self,
        object: &ObjectNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
        keys: KeySource<'_>,
    ) -> Result<Vec<(Option<String>, Value)>> {
        let Some(for_each) = &object.for_each else {
            return Ok(Vec::new());
        };

        if let Some(condition) = &object.condition {
            if !self.evaluate_condition(condition, ctx, &state.for_dyn_field("condition"))? {
                return Ok(Vec::new());
            }
        }

        let items = self.loop_items(for_each, ctx, state)?;
        let mut results = Vec::with_capacity(items.len());

        for (iteration, item) in items.into_iter().enumerate() {
            let iteration_state = state.for_clone(iteration);
            ctx.set_value(&for_each.variable, item)?;

            if let Some(condition) = &for_each.condition {
                let condition_state = iteration_state.for_dyn_field("for-each-condition");
                if !self.evaluate_condition(condition, ctx, &condition_state)? {
                    trace!(path = %iteration_state.path(), "iteration skipped by condition");
                    continue;
                }
            }

            let Some(body) = self.process_object(object, ctx, &iteration_state, Consumed::ITERATION)?
            else {
                continue;
            };

            let key = match keys {
                KeySource::None => None,
                KeySource::Constant(name) => Some(name.to_string()),
                KeySource::Expression(expression) => {
                    Some(self.evaluate_key(expression, ctx, &iteration_state)?)
                }
            };
            trace!(
                path = %iteration_state.path(),
                variable = %for_each.variable,
                key = ?key,
                "loop iteration"
            );
            results.push((key, body));
        }
        Ok(results)
    }

    fn loop_items(
        &self,
        for_each: &ForEachLoop,
        ctx: &dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Vec<Value>> {
        let expression = match &for_each.source {
            LoopSource::Literal(Value::Array(items)) => return Ok(items.clone()),
            LoopSource::Literal(Value::Null) => return Ok(Vec::new()),
            LoopSource::Literal(single) => return Ok(vec![single.clone()]),
            LoopSource::Expression(expression) => expression,
        };

        let source_state = state.for_dyn_field("for-each");
        match self.evaluate(expression, ctx, &source_state)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            Value::String(text) if text.is_empty() => Ok(Vec::new()),
            Value::Object(_) => Err(Error::InvalidLoopSource {
                path: source_state.path(),
                found: "object",
            }),
            single => Ok(vec![single]),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{Context, MapContext};
    use crate::engine::TransformEngine;
    use crate::error::Error;
    use crate::model::Template;
    use serde_json::{json, Value};

    fn run(template: &str, context: &mut MapContext) -> crate::error::Result<Value> {
        TransformEngine::new().process(&Template::parse(template)?, context)
    }

    #[test]
    fn test_list_expansion_keeps_order() {
        let template = r#"[{"@for-each(i)": "@expr: [1, 2, 3]", "n": "@expr: i * 2"}]"#;
        assert_eq!(
            run(template, &mut MapContext::new()).unwrap(),
            json!([{"n": 2}, {"n": 4}, {"n": 6}])
        );
    }

    #[test]
    fn test_literal_sources() {
        let template = r#"["start", {"@for-each(i)": [1, 2], "@value": "@expr: i"}, {"@for-each(s)": 5, "@value": "@expr: s"}]"#;
        assert_eq!(
            run(template, &mut MapContext::new()).unwrap(),
            json!(["start", 1, 2, 5])
        );
    }

    #[test]
    fn test_object_condition_is_checked_once() {
        let template = r#"[{"@for-each(i)": [1, 2], "@condition": "@expr: enabled", "v": "@expr: i"}]"#;
        let mut ctx = MapContext::new().with("enabled", json!(false));
        assert_eq!(run(template, &mut ctx).unwrap(), json!([]));
    }

    #[test]
    fn test_per_iteration_condition() {
        let template = r#"[{"@for-each(i)": [1, 2, 3, 4], "@for-each-condition": "i % 2 == 0", "@value": "@expr: i"}]"#;
        assert_eq!(run(template, &mut MapContext::new()).unwrap(), json!([2, 4]));
    }

    #[test]
    fn test_undefined_source_contributes_nothing() {
        let template = r#"{"a": [{"@for-each(i)": "missing", "@value": 1}]}"#;
        assert_eq!(run(template, &mut MapContext::new()).unwrap(), json!({"a": []}));
    }

    #[test]
    fn test_object_source_is_rejected() {
        let template = r#"[{"@for-each(i)": "@expr: cfg", "@value": 1}]"#;
        let mut ctx = MapContext::new().with("cfg", json!({"a": 1}));
        let err = run(template, &mut ctx).unwrap_err();
        assert!(matches!(&err, Error::InvalidLoopSource { path, .. } if path == "[0]#for-each"));
    }

    #[test]
    fn test_loop_variable_remains_bound() {
        let mut ctx = MapContext::new();
        run(r#"[{"@for-each(i)": [7, 8], "@value": 1}]"#, &mut ctx).unwrap();
        assert_eq!(ctx.get("i"), Some(json!(8)));
    }

    #[test]
    fn test_root_loop_yields_array() {
        let template = r#"{"@for-each(i)": [1, 2], "v": "@expr: i"}"#;
        assert_eq!(
            run(template, &mut MapContext::new()).unwrap(),
            json!([{"v": 1}, {"v": 2}])
        );
    }
}
