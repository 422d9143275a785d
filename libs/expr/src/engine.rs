//! Expression engine
//!
//! Compiles value expressions, templates and path queries once and keeps the
//! compiled forms in LRU caches shared across evaluations.

use crate::ast::AstNode;
use crate::error::Result;
use crate::functions::FunctionRegistry;
use crate::interpreter::{expect_bool, Interpreter};
use crate::parser::Parser;
use crate::path::PathQuery;
use crate::scope::{snapshot, Scope};
use crate::template::CompiledTemplate;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Engine construction options
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Capacity of each compiled-form cache (values below 1 are treated as 1)
    pub cache_size: usize,
    /// If `true`, a template placeholder that evaluates to `null` is an error
    pub strict_templates: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            strict_templates: true,
        }
    }
}

struct Cache<T> {
    entries: Mutex<LruCache<String, Arc<T>>>,
}

impl<T> Cache<T> {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get_or_compile(&self, key: &str, compile: impl FnOnce(&str) -> Result<T>) -> Result<Arc<T>> {
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(hit.clone());
        }
        let compiled = Arc::new(compile(key)?);
        tracing::trace!(source = key, "compiled and cached");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Expression engine
///
/// `Engine` is `Send + Sync`; compiled forms are immutable and shared via `Arc`.
pub struct Engine {
    functions: FunctionRegistry,
    expressions: Cache<AstNode>,
    templates: Cache<CompiledTemplate>,
    paths: Cache<PathQuery>,
    strict_templates: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.functions)
            .field("strict_templates", &self.strict_templates)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            functions: FunctionRegistry::new(),
            expressions: Cache::new(options.cache_size),
            templates: Cache::new(options.cache_size),
            paths: Cache::new(options.cache_size),
            strict_templates: options.strict_templates,
        }
    }

    /// Register a caller-supplied function
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::{json, Value};
    /// use tessera_expr::{Engine, MapScope};
    ///
    /// let mut engine = Engine::new();
    /// engine.register_function("double", |args: &[Value]| {
    ///     Ok(json!(args[0].as_i64().unwrap_or(0) * 2))
    /// });
    /// let value = engine.evaluate("double(21)", &MapScope::new()).unwrap();
    /// assert_eq!(value, json!(42));
    /// ```
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.register(name, function);
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn strict_templates(&self) -> bool {
        self.strict_templates
    }

    /// Compile a value expression (cached)
    pub fn compile(&self, expression: &str) -> Result<Arc<AstNode>> {
        self.expressions
            .get_or_compile(expression, |text| Parser::new(text).parse())
    }

    /// Compile a template (cached)
    pub fn compile_template(&self, text: &str) -> Result<Arc<CompiledTemplate>> {
        self.templates.get_or_compile(text, CompiledTemplate::compile)
    }

    /// Compile a path query (cached)
    pub fn compile_path(&self, path: &str) -> Result<Arc<PathQuery>> {
        self.paths.get_or_compile(path, PathQuery::compile)
    }

    /// Evaluate a value expression
    pub fn evaluate(&self, expression: &str, scope: &dyn Scope) -> Result<Value> {
        let ast = self.compile(expression)?;
        Interpreter::new(scope, &self.functions).evaluate(&ast)
    }

    /// Evaluate an expression that must produce a boolean
    pub fn evaluate_condition(&self, expression: &str, scope: &dyn Scope) -> Result<bool> {
        let value = self.evaluate(expression, scope)?;
        expect_bool(&value, "condition")
    }

    /// Render a `${ ... }` template
    pub fn render_template(&self, text: &str, scope: &dyn Scope) -> Result<String> {
        let template = self.compile_template(text)?;
        template.render(scope, &self.functions, self.strict_templates)
    }

    /// First value selected by a path query, or `null`
    pub fn select_path(&self, path: &str, scope: &dyn Scope) -> Result<Value> {
        let query = self.compile_path(path)?;
        Ok(query.select_first(&snapshot(scope)))
    }

    /// Every value selected by a path query
    pub fn select_all(&self, path: &str, scope: &dyn Scope) -> Result<Vec<Value>> {
        let query = self.compile_path(path)?;
        Ok(query.select_all(&snapshot(scope)))
    }

    /// Drop every cached compiled form
    pub fn clear_cache(&self) {
        self.expressions.clear();
        self.templates.clear();
        self.paths.clear();
    }
}
