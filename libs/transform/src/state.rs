//! Per-descent transformation state
//!
//! A `TransformState` is never mutated: every descent step derives a new one, so
//! sibling branches cannot corrupt each other's breadcrumb.
//!
//! Breadcrumb syntax: `/name` for a field, `[i]` for a list element, `{clone:i}`
//! for a loop iteration and `#name` for synthetic steps such as `#value`.

use crate::error::display_path;
use crate::generator::Generator;
use crate::model::{Field, ObjectNode};
use serde_json::{Map, Value};

#[derive(Clone)]
pub struct TransformState<'g> {
    path: String,
    attribute_mode: bool,
    include_depth: usize,
    generator: &'g dyn Generator,
}

impl std::fmt::Debug for TransformState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformState")
            .field("path", &self.path)
            .field("attribute_mode", &self.attribute_mode)
            .field("include_depth", &self.include_depth)
            .field("generator", &self.generator.name())
            .finish()
    }
}

impl<'g> TransformState<'g> {
    pub fn root(generator: &'g dyn Generator) -> Self {
        Self {
            path: String::new(),
            attribute_mode: false,
            include_depth: 0,
            generator,
        }
    }

    /// Breadcrumb for diagnostics (`/` at the root)
    pub fn path(&self) -> String {
        display_path(&self.path)
    }

    pub fn attribute_mode(&self) -> bool {
        self.attribute_mode
    }

    pub fn include_depth(&self) -> usize {
        self.include_depth
    }

    fn derive(&self, segment: std::fmt::Arguments<'_>) -> Self {
        Self {
            path: format!("{}{}", self.path, segment),
            ..self.clone()
        }
    }

    pub fn for_field(&self, name: &str) -> Self {
        self.derive(format_args!("/{}", name))
    }

    pub fn for_index(&self, index: usize) -> Self {
        self.derive(format_args!("[{}]", index))
    }

    pub fn for_clone(&self, iteration: usize) -> Self {
        self.derive(format_args!("{{clone:{}}}", iteration))
    }

    pub fn for_dyn_field(&self, name: &str) -> Self {
        self.derive(format_args!("#{}", name))
    }

    pub fn with_attribute_mode(&self, attribute_mode: bool) -> Self {
        Self {
            attribute_mode,
            ..self.clone()
        }
    }

    /// Root state for an included template, one level deeper
    pub fn for_include(&self) -> Self {
        Self {
            path: String::new(),
            attribute_mode: false,
            include_depth: self.include_depth + 1,
            generator: self.generator,
        }
    }

    pub fn generator(&self) -> &'g dyn Generator {
        self.generator
    }

    pub fn new_object(&self, node: &ObjectNode) -> Map<String, Value> {
        self.generator.new_object(self, node)
    }

    pub fn set_field(&self, field: &Field, container: &mut Map<String, Value>, key: String, value: Value) {
        self.generator.set_field(self, field, container, key, value);
    }

    pub fn inject_replace_entries(&self, field: &Field, container: &mut Map<String, Value>, entries: Map<String, Value>) {
        self.generator
            .inject_replace_entries(self, field, container, entries);
    }

    pub fn convert_included(&self, value: Value) -> Value {
        self.generator.convert_included(&self.path(), value)
    }

    pub fn to_plain(&self, value: Value) -> Value {
        self.generator.to_plain(value)
    }
}
