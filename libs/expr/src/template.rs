//! `${ ... }` text templates
//!
//! A template is split once into literal text and placeholder segments. Each
//! placeholder body is an ordinary value expression. `$${` escapes a literal `${`.

use crate::ast::AstNode;
use crate::error::{Error, Result};
use crate::functions::FunctionRegistry;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::scope::Scope;
use crate::value::render;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Placeholder { source: String, ast: AstNode },
}

/// A template split into literal and placeholder segments
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    pub fn compile(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            if rest[..start].ends_with('$') {
                literal.push_str(&rest[..start - 1]);
                literal.push_str("${");
                rest = &rest[start + 2..];
                continue;
            }

            literal.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let (ast, end) = Parser::new(body).parse_embedded().map_err(|e| match e {
                Error::ParseError(message) => Error::ParseError(format!(
                    "{} in placeholder starting at offset {}",
                    message,
                    text.len() - rest.len() + start
                )),
                other => other,
            })?;
            // `end` is a character offset just past the closing brace
            let end_byte = body
                .char_indices()
                .nth(end)
                .map(|(i, _)| i)
                .unwrap_or(body.len());

            if !literal.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder {
                source: body[..end_byte - 1].trim().to_string(),
                ast,
            });
            rest = &body[end_byte..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }
        Ok(Self { segments })
    }

    /// True when the template has no placeholders
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Text(_)))
    }

    /// Source text of each placeholder, in order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { source, .. } => Some(source.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render against a scope.
    ///
    /// In strict mode a placeholder evaluating to `null` is an `UndefinedValue` error;
    /// otherwise it renders as the empty string.
    pub fn render(&self, scope: &dyn Scope, functions: &FunctionRegistry, strict: bool) -> Result<String> {
        let interpreter = Interpreter::new(scope, functions);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder { source, ast } => {
                    let value = interpreter.evaluate(ast)?;
                    if value.is_null() {
                        if strict {
                            return Err(Error::UndefinedValue(source.clone()));
                        }
                        tracing::warn!(placeholder = %source, "placeholder evaluated to null, rendering empty");
                        continue;
                    }
                    out.push_str(&render(&value));
                }
            }
        }
        Ok(out)
    }
}
