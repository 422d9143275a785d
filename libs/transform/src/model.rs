//! Parsed template model
//!
//! A template is parsed once into this immutable tree and may be processed any
//! number of times against different contexts.

use crate::error::Result;
use serde_json::Value;
use std::fmt;

/// How an expression string is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `${ ... }` substitution producing a string (`@template:` or implicit)
    Template,
    /// Value expression producing a typed value (`@expr:`)
    Value,
    /// First match of a path query (`@path:`)
    Path,
    /// Every match of a path query as a list (`@pathMulti:`)
    PathMulti,
}

impl ExpressionKind {
    /// Marker type name as written in templates
    pub fn marker(&self) -> &'static str {
        match self {
            ExpressionKind::Template => "template",
            ExpressionKind::Value => "expr",
            ExpressionKind::Path => "path",
            ExpressionKind::PathMulti => "pathMulti",
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "template" => Some(ExpressionKind::Template),
            "expr" => Some(ExpressionKind::Value),
            "path" => Some(ExpressionKind::Path),
            "pathMulti" => Some(ExpressionKind::PathMulti),
            _ => None,
        }
    }
}

/// An unevaluated expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub text: String,
}

impl Expression {
    pub fn new(kind: ExpressionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: {}", self.kind.marker(), self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal value returned unchanged; `null` means "no value"
    Scalar(Value),
    Expression(Expression),
    Object(Box<ObjectNode>),
    List(ListNode),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNode {
    pub elements: Vec<TemplateNode>,
    /// Guard from a leading `"@condition: ..."` element
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    pub fields: Vec<Field>,
    pub condition: Option<Expression>,
    pub value: Option<TemplateNode>,
    pub false_value: Option<TemplateNode>,
    pub resource: Option<ResourceSpec>,
    pub include: Option<IncludeSpec>,
    pub transform: Option<Expression>,
    pub for_each: Option<ForEachLoop>,
}

/// What a field does with its resolved value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Written to the output under its (possibly computed) name
    Ordinary,
    /// `@set(var)`: bound into the context, never written to the output
    Set(String),
    /// `@replace(tag)`: an object whose entries are spliced into the parent
    Replace(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Key as written in the template
    pub name: String,
    /// Present when the key itself is an expression
    pub name_expression: Option<Expression>,
    pub value: TemplateNode,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopSource {
    Expression(Expression),
    /// A literal JSON array is iterated verbatim; any other literal is a single element
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachLoop {
    pub variable: String,
    pub source: LoopSource,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub id: String,
    /// `false` when `@expressions: false` disables template evaluation of the text
    pub expressions: bool,
    /// `@resParams`, resolved and bound as `resParams`
    pub params: Option<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncludeSpec {
    pub id: String,
    /// `@params`, resolved and bound as `params` inside the included template
    pub params: Option<TemplateNode>,
}

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    root: TemplateNode,
    name: Option<String>,
}

impl Template {
    pub fn new(root: TemplateNode) -> Self {
        Self { root, name: None }
    }

    /// Parse a JSON template document
    pub fn parse(text: &str) -> Result<Self> {
        crate::parser::parse_str(text)
    }

    /// Parse an already-decoded document (JSON or YAML source)
    pub fn from_value(value: &Value) -> Result<Self> {
        crate::parser::parse_value(value)
    }

    /// Parse a YAML template document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        crate::parser::parse_value(&value)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn root(&self) -> &TemplateNode {
        &self.root
    }

    /// Count nodes and directives
    pub fn stats(&self) -> TemplateStats {
        let mut stats = TemplateStats::default();
        stats.visit(&self.root);
        stats
    }
}

/// Node and directive counts of a template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateStats {
    pub objects: usize,
    pub lists: usize,
    pub expressions: usize,
    pub conditions: usize,
    pub loops: usize,
    pub set_fields: usize,
    pub replace_fields: usize,
    pub dynamic_keys: usize,
    pub transforms: usize,
    pub resources: usize,
    pub includes: usize,
}

impl TemplateStats {
    fn visit(&mut self, node: &TemplateNode) {
        match node {
            TemplateNode::Scalar(_) => {}
            TemplateNode::Expression(_) => self.expressions += 1,
            TemplateNode::List(list) => {
                self.lists += 1;
                self.conditions += usize::from(list.condition.is_some());
                for element in &list.elements {
                    self.visit(element);
                }
            }
            TemplateNode::Object(object) => {
                self.objects += 1;
                self.conditions += usize::from(object.condition.is_some());
                self.loops += usize::from(object.for_each.is_some());
                self.transforms += usize::from(object.transform.is_some());
                self.resources += usize::from(object.resource.is_some());
                self.includes += usize::from(object.include.is_some());
                for node in [&object.value, &object.false_value].into_iter().flatten() {
                    self.visit(node);
                }
                if let Some(params) = object.include.as_ref().and_then(|i| i.params.as_ref()) {
                    self.visit(params);
                }
                if let Some(params) = object.resource.as_ref().and_then(|r| r.params.as_ref()) {
                    self.visit(params);
                }
                for field in &object.fields {
                    match field.kind {
                        FieldKind::Set(_) => self.set_fields += 1,
                        FieldKind::Replace(_) => self.replace_fields += 1,
                        FieldKind::Ordinary => {}
                    }
                    self.dynamic_keys += usize::from(field.name_expression.is_some());
                    self.visit(&field.value);
                }
            }
        }
    }
}

impl fmt::Display for TemplateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "objects:        {}", self.objects)?;
        writeln!(f, "lists:          {}", self.lists)?;
        writeln!(f, "expressions:    {}", self.expressions)?;
        writeln!(f, "conditions:     {}", self.conditions)?;
        writeln!(f, "loops:          {}", self.loops)?;
        writeln!(f, "@set fields:    {}", self.set_fields)?;
        writeln!(f, "@replace:       {}", self.replace_fields)?;
        writeln!(f, "dynamic keys:   {}", self.dynamic_keys)?;
        writeln!(f, "transforms:     {}", self.transforms)?;
        writeln!(f, "resources:      {}", self.resources)?;
        write!(f, "includes:       {}", self.includes)
    }
}
