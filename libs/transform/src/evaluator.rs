//! Boundary between the transform engine and an expression language
//!
//! Every method receives a diagnostic `name` (the breadcrumb of the node being
//! evaluated), the raw expression text and the scope to read variables from.

use serde_json::Value;
use tessera_expr::{Engine, Result, Scope};

pub trait ExpressionEvaluator: Send + Sync {
    /// Whole-string `${ ... }` substitution
    fn evaluate_template(&self, name: &str, text: &str, scope: &dyn Scope) -> Result<String>;

    /// Typed value expression
    fn evaluate_value(&self, name: &str, expression: &str, scope: &dyn Scope) -> Result<Value>;

    /// Expression that must reduce to a boolean
    fn evaluate_condition(&self, name: &str, expression: &str, scope: &dyn Scope) -> Result<bool>;

    /// First match of a path query, `null` if none
    fn evaluate_path(&self, name: &str, path: &str, scope: &dyn Scope) -> Result<Value>;

    /// Every match of a path query
    fn evaluate_path_multi(&self, name: &str, path: &str, scope: &dyn Scope) -> Result<Vec<Value>>;
}

impl ExpressionEvaluator for Engine {
    fn evaluate_template(&self, name: &str, text: &str, scope: &dyn Scope) -> Result<String> {
        tracing::trace!(node = name, "rendering template");
        self.render_template(text, scope)
    }

    fn evaluate_value(&self, name: &str, expression: &str, scope: &dyn Scope) -> Result<Value> {
        tracing::trace!(node = name, expression, "evaluating expression");
        self.evaluate(expression, scope)
    }

    fn evaluate_condition(&self, name: &str, expression: &str, scope: &dyn Scope) -> Result<bool> {
        tracing::trace!(node = name, expression, "evaluating condition");
        Engine::evaluate_condition(self, expression, scope)
    }

    fn evaluate_path(&self, name: &str, path: &str, scope: &dyn Scope) -> Result<Value> {
        tracing::trace!(node = name, path, "selecting path");
        self.select_path(path, scope)
    }

    fn evaluate_path_multi(&self, name: &str, path: &str, scope: &dyn Scope) -> Result<Vec<Value>> {
        tracing::trace!(node = name, path, "selecting all path matches");
        self.select_all(path, scope)
    }
}
