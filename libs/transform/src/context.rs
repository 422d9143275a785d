//! Variable contexts read and written during a transformation
//!
//! A context is created per `process` call. Loop variables, `@set` fields and the
//! `thisValue` binding of `@transform` are written into it; expressions read it
//! through [`Scope`].

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tessera_expr::Scope;

/// Mutable name to value environment
pub trait Context {
    /// Look up a binding; `None` when the name was never set
    fn get(&self, name: &str) -> Option<Value>;

    /// Bind `name`, replacing any previous value
    fn set_value(&mut self, name: &str, value: Value) -> Result<()>;

    /// Every visible name
    fn names(&self) -> Vec<String>;

    /// View used by the expression evaluator
    fn as_scope(&self) -> &dyn Scope;
}

/// Root context backed by an insertion-ordered map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapContext {
    values: Map<String, Value>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; `null` gives an empty context, anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::Config(format!(
                "context must be an object but found {}",
                tessera_expr::value::type_name(&other)
            ))),
        }
    }

    /// Build from any serializable value whose JSON form is an object
    pub fn from_serializable<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Self::from_value(serde_json::to_value(data)?)
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

impl Scope for MapContext {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

impl Context for MapContext {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn as_scope(&self) -> &dyn Scope {
        self
    }
}

/// Overlay exposing one read-only binding on top of a parent context.
///
/// Reads of the overlay key see the overlay value; every other read and every
/// write goes to the parent.
pub struct ChildContext<'p> {
    parent: &'p mut dyn Context,
    key: String,
    value: Value,
}

impl<'p> ChildContext<'p> {
    pub fn new(parent: &'p mut dyn Context, key: impl Into<String>, value: Value) -> Self {
        Self {
            parent,
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Scope for ChildContext<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        Context::get(self, name)
    }

    fn names(&self) -> Vec<String> {
        Context::names(self)
    }
}

impl Context for ChildContext<'_> {
    fn get(&self, name: &str) -> Option<Value> {
        if name == self.key {
            return Some(self.value.clone());
        }
        self.parent.get(name)
    }

    fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        if name == self.key {
            return Err(Error::ReadOnlyBinding(name.to_string()));
        }
        self.parent.set_value(name, value)
    }

    fn names(&self) -> Vec<String> {
        let mut names = self.parent.names();
        if !names.iter().any(|name| name == &self.key) {
            names.push(self.key.clone());
        }
        names
    }

    fn as_scope(&self) -> &dyn Scope {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_reads_overlay_then_parent() {
        let mut root = MapContext::new().with("a", json!(1));
        let child = ChildContext::new(&mut root, "params", json!({"p": true}));
        assert_eq!(child.get("params"), Some(json!({"p": true})));
        assert_eq!(child.get("a"), Some(json!(1)));
        assert_eq!(child.get("missing"), None);
        assert_eq!(Context::names(&child), vec!["a".to_string(), "params".to_string()]);
    }

    #[test]
    fn test_child_writes_go_to_parent() {
        let mut root = MapContext::new();
        {
            let mut child = ChildContext::new(&mut root, "params", json!(null));
            child.set_value("x", json!(5)).unwrap();
            assert_eq!(child.get("x"), Some(json!(5)));
        }
        assert_eq!(root.get("x"), Some(json!(5)));
    }

    #[test]
    fn test_overlay_key_is_read_only() {
        let mut root = MapContext::new().with("params", json!("outer"));
        let mut child = ChildContext::new(&mut root, "params", json!("inner"));
        assert!(matches!(
            child.set_value("params", json!(1)),
            Err(Error::ReadOnlyBinding(name)) if name == "params"
        ));
        assert_eq!(child.get("params"), Some(json!("inner")));
        drop(child);
        assert_eq!(root.get("params"), Some(json!("outer")));
    }

    #[test]
    fn test_nested_children() {
        let mut root = MapContext::new();
        let mut outer = ChildContext::new(&mut root, "params", json!(1));
        let mut inner = ChildContext::new(&mut outer, "resParams", json!(2));
        assert_eq!(inner.get("params"), Some(json!(1)));
        assert!(inner.set_value("params", json!(0)).is_err());
        inner.set_value("v", json!(3)).unwrap();
        drop(inner);
        assert_eq!(outer.get("v"), Some(json!(3)));
    }

    #[test]
    fn test_from_serializable() {
        #[derive(Serialize)]
        struct Order {
            id: u32,
            customer: &'static str,
        }
        let ctx = MapContext::from_serializable(&Order {
            id: 7,
            customer: "ada",
        })
        .unwrap();
        assert_eq!(ctx.get("customer"), Some(json!("ada")));
        assert!(MapContext::from_serializable(&vec![1, 2]).is_err());
    }
}
