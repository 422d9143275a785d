//! Tessera template transformation
//!
//! Turns a declarative JSON (or YAML) template plus a variable context into a
//! structured document, serialized as JSON, YAML or XML. Templates are parsed
//! once into an immutable model and can be processed any number of times.
//!
//! ```text
//! template text --parser--> Template --TransformEngine::process(context)--> Value
//!                                              |
//!                     ExpressionEvaluator / ResourceLoader / Generator
//! ```
//!
//! # Template syntax
//!
//! | Form                        | Meaning                                           |
//! |-----------------------------|---------------------------------------------------|
//! | `"hello ${name}"`           | template substitution                             |
//! | `"@expr: total * 2"`        | typed value expression                            |
//! | `"@path: /order/id"`        | first path match                                  |
//! | `"@pathMulti: //sku"`       | every path match as a list                        |
//! | `"@condition"`              | drop the node unless true                         |
//! | `"@value"` / `"@falseValue"`| replace the object with a single value            |
//! | `"@for-each(x)"`            | repeat the object once per source element         |
//! | `"@set(x)"`                 | bind a context variable, write nothing            |
//! | `"@replace(tag)"`           | splice an object's entries into the parent        |
//! | `"@include"` / `"@resource"`| embed another template or a text resource         |
//! | `"@transform"`              | post-process a value through `thisValue`          |
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tessera_transform::{MapContext, Template, TransformEngine};
//!
//! let template = Template::parse(r#"{
//!     "customer": "${order.customer}",
//!     "lines": [{
//!         "@for-each(item)": "order.items",
//!         "sku": "@expr: item.sku",
//!         "express": {"@condition": "item.qty > 1", "@value": true}
//!     }]
//! }"#).unwrap();
//!
//! let mut context = MapContext::new().with("order", json!({
//!     "customer": "ada",
//!     "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]
//! }));
//!
//! let result = TransformEngine::new().process(&template, &mut context).unwrap();
//! assert_eq!(result, json!({
//!     "customer": "ada",
//!     "lines": [{"sku": "a"}, {"sku": "b", "express": true}]
//! }));
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod generator;
mod include;
pub mod loader;
pub mod model;
pub mod parser;
mod repeat;
pub mod state;
pub mod xml;

pub use config::EngineConfig;
pub use context::{ChildContext, Context, MapContext};
pub use engine::{TransformEngine, TransformEngineBuilder, THIS_VALUE};
pub use error::{Error, Result};
pub use evaluator::ExpressionEvaluator;
pub use generator::{Generator, JsonGenerator, OutputFormat, YamlGenerator};
pub use include::{PARAMS, RES_PARAMS};
pub use loader::{FsLoader, LoadError, MemoryLoader, ResourceLoader};
pub use model::{Template, TemplateNode, TemplateStats};
pub use state::TransformState;
pub use xml::XmlGenerator;
