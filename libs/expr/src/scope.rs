//! Variable scope consulted by expressions

use serde_json::{Map, Value};

/// Read access to the variables an expression can see.
///
/// The transform context implements this trait; `MapScope` is a plain
/// insertion-ordered implementation for standalone use.
pub trait Scope {
    /// Look up a variable by name
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Names of every visible variable, used by path queries rooted at `/`
    fn names(&self) -> Vec<String>;
}

/// Scope backed by a JSON object
#[derive(Debug, Clone, Default)]
pub struct MapScope {
    variables: Map<String, Value>,
}

impl MapScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from a JSON value; non-object values yield an empty scope
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(variables) => Self { variables },
            _ => Self::default(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }
}

impl Scope for MapScope {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}

/// Materialize every visible variable as one JSON object
pub fn snapshot(scope: &dyn Scope) -> Value {
    let mut root = Map::new();
    for name in scope.names() {
        if let Some(value) = scope.lookup(&name) {
            root.insert(name, value);
        }
    }
    Value::Object(root)
}
