//! Tessera expression language
//!
//! The default expression evaluator for the Tessera transform engine:
//!
//! - **Value expressions** over `serde_json::Value` (`user.name ?? 'anonymous'`)
//! - **Templates** with `${ ... }` placeholders (`"hello ${name}"`)
//! - **Path queries** in an XPath-like syntax (`/order/items[2]/sku`)
//!
//! ```text
//! Expression String
//!      |
//!   Lexer -> Tokens
//!      |
//!   Parser -> AST   (cached by Engine)
//!      |
//!   Interpreter -> Value
//! ```
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tessera_expr::{Engine, MapScope};
//!
//! let engine = Engine::new();
//! let scope = MapScope::new().with("name", json!("world"));
//! assert_eq!(engine.render_template("hello ${name}", &scope).unwrap(), "hello world");
//! assert_eq!(engine.evaluate("size(name) * 2", &scope).unwrap(), json!(10));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod path;
pub mod scope;
pub mod template;
pub mod token;
pub mod value;

// Re-export main types
pub use engine::{Engine, EngineOptions, DEFAULT_CACHE_SIZE};
pub use error::{Error, Result};
pub use functions::{FunctionMetadata, FunctionRegistry, NativeFunction};
pub use path::PathQuery;
pub use scope::{snapshot, MapScope, Scope};
pub use template::CompiledTemplate;
