//! XPath-like path queries over JSON values
//!
//! ```text
//! path      := ('/' | '//')? step (('/' | '//') step)*
//! step      := (name | '*' | '.' | '..') predicate*
//! predicate := '[' integer ']' | '[' name ']' | '[' name '=' literal ']'
//! ```
//!
//! Arrays are transparent: stepping onto an array visits each of its elements.
//! Positions in `[n]` are 1-based and counted per context node.

use crate::error::{Error, Result};
use crate::value::{render, values_equal};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    Wildcard,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Exists(String),
    Equals(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A compiled path query
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    steps: Vec<Step>,
}

/// A selected value plus the chain of objects above it
#[derive(Clone)]
struct Node<'v> {
    value: &'v Value,
    ancestors: Vec<&'v Value>,
}

impl PathQuery {
    pub fn compile(text: &str) -> Result<Self> {
        PathParser::new(text).parse()
    }

    /// Every match in document order
    pub fn select_all(&self, root: &Value) -> Vec<Value> {
        let mut current = Vec::new();
        push_expanded(&mut current, root, &[]);
        for step in &self.steps {
            let mut next = Vec::new();
            for node in &current {
                let mut candidates = step.candidates(node);
                for predicate in &step.predicates {
                    candidates = predicate.filter(candidates);
                }
                next.extend(candidates);
            }
            current = next;
        }
        current.into_iter().map(|node| node.value.clone()).collect()
    }

    /// First match, or `null` when nothing matches
    pub fn select_first(&self, root: &Value) -> Value {
        self.select_all(root).into_iter().next().unwrap_or(Value::Null)
    }
}

fn push_expanded<'v>(out: &mut Vec<Node<'v>>, value: &'v Value, ancestors: &[&'v Value]) {
    match value {
        Value::Array(items) => {
            for item in items {
                push_expanded(out, item, ancestors);
            }
        }
        Value::Null => {}
        _ => out.push(Node {
            value,
            ancestors: ancestors.to_vec(),
        }),
    }
}

fn children<'v>(node: &Node<'v>, name: Option<&str>) -> Vec<Node<'v>> {
    let mut out = Vec::new();
    if let Value::Object(map) = node.value {
        let mut ancestors = node.ancestors.clone();
        ancestors.push(node.value);
        match name {
            Some(name) => {
                if let Some(child) = map.get(name) {
                    push_expanded(&mut out, child, &ancestors);
                }
            }
            None => {
                for child in map.values() {
                    push_expanded(&mut out, child, &ancestors);
                }
            }
        }
    }
    out
}

fn descendants_or_self<'v>(node: &Node<'v>, out: &mut Vec<Node<'v>>) {
    out.push(node.clone());
    for child in children(node, None) {
        descendants_or_self(&child, out);
    }
}

impl Step {
    fn candidates<'v>(&self, node: &Node<'v>) -> Vec<Node<'v>> {
        let contexts = match self.axis {
            Axis::Child => vec![node.clone()],
            Axis::Descendant => {
                let mut all = Vec::new();
                descendants_or_self(node, &mut all);
                all
            }
        };

        let mut out = Vec::new();
        for context in &contexts {
            match &self.test {
                NodeTest::Name(name) => out.extend(children(context, Some(name))),
                NodeTest::Wildcard => out.extend(children(context, None)),
                NodeTest::SelfNode => out.push(context.clone()),
                NodeTest::Parent => {
                    if let Some((parent, rest)) = context.ancestors.split_last() {
                        out.push(Node {
                            value: *parent,
                            ancestors: rest.to_vec(),
                        });
                    }
                }
            }
        }
        out
    }
}

impl Predicate {
    fn filter<'v>(&self, nodes: Vec<Node<'v>>) -> Vec<Node<'v>> {
        match self {
            Predicate::Position(position) => nodes.into_iter().skip(position - 1).take(1).collect(),
            Predicate::Exists(name) => nodes
                .into_iter()
                .filter(|node| !children(node, Some(name)).is_empty())
                .collect(),
            Predicate::Equals(name, literal) => nodes
                .into_iter()
                .filter(|node| {
                    children(node, Some(name))
                        .iter()
                        .any(|child| loosely_equal(child.value, literal))
                })
                .collect(),
        }
    }
}

/// Strings compare by their rendered text so `[id = '7']` matches the number 7
fn loosely_equal(value: &Value, literal: &Value) -> bool {
    if values_equal(value, literal) {
        return true;
    }
    match (value, literal) {
        (Value::String(_), _) | (_, Value::String(_)) => render(value) == render(literal),
        _ => false,
    }
}

struct PathParser {
    chars: Vec<char>,
    position: usize,
    source: String,
}

impl PathParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.trim().chars().collect(),
            position: 0,
            source: text.to_string(),
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::ParseError(format!(
            "{} at position {} in path '{}'",
            message, self.position, self.source
        ))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.position += 1;
        }
    }

    /// Consume a `/` or `//` separator and return its axis
    fn separator(&mut self) -> Option<Axis> {
        if self.peek() != Some('/') {
            return None;
        }
        self.position += 1;
        if self.peek() == Some('/') {
            self.position += 1;
            return Some(Axis::Descendant);
        }
        Some(Axis::Child)
    }

    fn parse(mut self) -> Result<PathQuery> {
        if self.chars.is_empty() {
            return Err(Error::ParseError("Empty path".to_string()));
        }
        let mut steps = Vec::new();
        let mut axis = self.separator().unwrap_or(Axis::Child);

        // A lone "/" selects the root
        if self.peek().is_none() && axis == Axis::Child {
            return Ok(PathQuery { steps });
        }

        loop {
            steps.push(self.step(axis)?);
            match self.separator() {
                Some(next) => axis = next,
                None if self.peek().is_none() => break,
                None => return Err(self.error("Expected '/'")),
            }
        }
        Ok(PathQuery { steps })
    }

    fn step(&mut self, axis: Axis) -> Result<Step> {
        let test = match self.peek() {
            Some('*') => {
                self.position += 1;
                NodeTest::Wildcard
            }
            Some('.') if self.peek_at(1) == Some('.') => {
                self.position += 2;
                NodeTest::Parent
            }
            Some('.') => {
                self.position += 1;
                NodeTest::SelfNode
            }
            _ => NodeTest::Name(self.name()?),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some('[') {
            self.position += 1;
            predicates.push(self.predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn name(&mut self) -> Result<String> {
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '-' | '@' | ':' | '$'))
        {
            self.position += 1;
        }
        if start == self.position {
            return Err(self.error("Expected a name"));
        }
        Ok(self.chars[start..self.position].iter().collect())
    }

    fn predicate(&mut self) -> Result<Predicate> {
        self.skip_whitespace();
        let predicate = if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            let start = self.position;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.position += 1;
            }
            let digits: String = self.chars[start..self.position].iter().collect();
            let position: usize = digits
                .parse()
                .map_err(|_| self.error("Invalid position"))?;
            if position == 0 {
                return Err(self.error("Positions are 1-based"));
            }
            Predicate::Position(position)
        } else {
            let name = self.name()?;
            self.skip_whitespace();
            if self.peek() == Some('=') {
                self.position += 1;
                self.skip_whitespace();
                Predicate::Equals(name, self.literal()?)
            } else {
                Predicate::Exists(name)
            }
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("Expected ']'"));
        }
        self.position += 1;
        Ok(predicate)
    }

    fn literal(&mut self) -> Result<Value> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.position += 1;
                let start = self.position;
                while matches!(self.peek(), Some(c) if c != quote) {
                    self.position += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("Unterminated string"));
                }
                let text: String = self.chars[start..self.position].iter().collect();
                self.position += 1;
                Ok(Value::String(text))
            }
            _ => {
                let start = self.position;
                while matches!(self.peek(), Some(c) if c != ']' && !c.is_whitespace()) {
                    self.position += 1;
                }
                let token: String = self.chars[start..self.position].iter().collect();
                serde_json::from_str(&token).map_err(|_| self.error("Invalid literal"))
            }
        }
    }
}
