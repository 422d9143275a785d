//! `@include` and `@resource`

use crate::context::{ChildContext, Context};
use crate::engine::TransformEngine;
use crate::error::{Error, Result};
use crate::model::{IncludeSpec, ResourceSpec, Template, TemplateNode};
use crate::state::TransformState;
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError};
use tracing::debug;

/// Binding holding resolved `@params` inside an included template
pub const PARAMS: &str = "params";

/// Binding holding resolved `@resParams` while a resource is rendered
pub const RES_PARAMS: &str = "resParams";

impl TransformEngine {
    /// Process an included template with its parameters bound as `params`
    pub(crate) fn process_include(
        &self,
        include: &IncludeSpec,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Option<Value>> {
        let include_state = state.for_dyn_field("include");
        if state.include_depth() >= self.config.max_include_depth {
            return Err(Error::RecursionLimit {
                path: include_state.path(),
                depth: self.config.max_include_depth,
            });
        }

        let template = self.load_template(&include.id, &include_state)?;
        let params = match &include.params {
            Some(node) => self.resolve_params(node, ctx, &include_state.for_dyn_field("params"))?,
            None => Value::Object(Map::new()),
        };

        let mut child = ChildContext::new(ctx, PARAMS, params);
        let result = self
            .process_node(template.root(), &mut child, &state.for_include())
            .map_err(|source| Error::Include {
                path: include_state.path(),
                target: include.id.clone(),
                source: Box::new(source),
            })?;
        Ok(result.map(|value| include_state.convert_included(value)))
    }

    /// Load a resource's text, rendering it as a template unless `@expressions` is false
    pub(crate) fn load_resource(
        &self,
        resource: &ResourceSpec,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<String> {
        let resource_state = state.for_dyn_field("resource");
        debug!(resource = %resource.id, "loading resource");
        let text = self
            .loader
            .load(&resource.id)
            .map_err(|source| Error::Resource {
                path: resource_state.path(),
                target: resource.id.clone(),
                source,
            })?;
        if !resource.expressions {
            return Ok(text);
        }

        let name = resource_state.path();
        let rendered = match &resource.params {
            Some(node) => {
                let params =
                    self.resolve_params(node, ctx, &resource_state.for_dyn_field("resParams"))?;
                let child = ChildContext::new(ctx, RES_PARAMS, params);
                self.evaluator
                    .evaluate_template(&name, &text, child.as_scope())
            }
            None => self.evaluator.evaluate_template(&name, &text, ctx.as_scope()),
        };
        rendered.map_err(|source| Error::Evaluation {
            path: name,
            expression: resource.id.clone(),
            source,
        })
    }

    /// Parameters are resolved in attribute mode and reduced to plain data
    fn resolve_params(
        &self,
        node: &TemplateNode,
        ctx: &mut dyn Context,
        state: &TransformState<'_>,
    ) -> Result<Value> {
        let params = self.process_node(node, ctx, &state.with_attribute_mode(true))?;
        Ok(params
            .map(|value| state.to_plain(value))
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Parse an included template once and cache it by id
    fn load_template(&self, id: &str, state: &TransformState<'_>) -> Result<Arc<Template>> {
        if let Some(template) = self
            .includes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            debug!(template = id, "include cache hit");
            return Ok(template.clone());
        }

        debug!(template = id, "loading included template");
        let text = self.loader.load(id).map_err(|source| Error::Resource {
            path: state.path(),
            target: id.to_string(),
            source,
        })?;
        let parsed = if is_yaml(id) {
            Template::from_yaml(&text)
        } else {
            Template::parse(&text)
        };
        let template = Arc::new(
            parsed
                .map_err(|source| Error::Include {
                    path: state.path(),
                    target: id.to_string(),
                    source: Box::new(source),
                })?
                .with_name(id),
        );
        self.includes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(id.to_string(), template.clone());
        Ok(template)
    }
}

fn is_yaml(id: &str) -> bool {
    id.ends_with(".yaml") || id.ends_with(".yml")
}
