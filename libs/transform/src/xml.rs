//! XML output
//!
//! Results stay `serde_json` maps while the template is walked and are written
//! as XML at the end. Keys map onto the document as follows:
//!
//! - `-name` becomes an attribute of the enclosing element
//! - `#text` becomes the element's text content
//! - any other key becomes a child element; list values repeat the element
//!
//! Outside attribute mode scalars are stored as text and repeated keys
//! accumulate into lists, so fan-out loops and `@replace` splices append
//! sibling elements. In attribute mode (`@set` values and include or resource
//! parameters) containers are plain data: prefixes are stripped and values keep
//! their JSON types.

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::model::Field;
use crate::state::TransformState;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};
use std::io::Cursor;

pub const ATTRIBUTE_PREFIX: char = '-';
pub const TEXT_KEY: &str = "#text";

const DEFAULT_ROOT: &str = "root";
const LIST_ITEM: &str = "item";

/// XML output, indented or on a single line
#[derive(Debug, Clone)]
pub struct XmlGenerator {
    /// Element wrapping results that do not name their own document element
    pub root: String,
    pub pretty: bool,
}

impl Default for XmlGenerator {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            pretty: true,
        }
    }
}

impl XmlGenerator {
    pub fn new(pretty: bool) -> Self {
        Self {
            pretty,
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

impl Generator for XmlGenerator {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn set_field(
        &self,
        state: &TransformState<'_>,
        _field: &Field,
        container: &mut Map<String, Value>,
        key: String,
        value: Value,
    ) {
        if state.attribute_mode() {
            let key = plain_key(&key);
            match to_plain(value) {
                Value::Array(items) => {
                    for item in items {
                        accumulate(container, key.to_string(), item);
                    }
                }
                other => accumulate(container, key.to_string(), other),
            }
            return;
        }

        if is_attribute(&key) {
            // A repeated attribute keeps its last value
            let value = match value {
                Value::Array(mut items) => match items.pop() {
                    Some(last) => last,
                    None => return,
                },
                other => other,
            };
            container.insert(key, Value::String(text_of(&value)));
            return;
        }

        if key == TEXT_KEY {
            let text = text_of(&value);
            match container.get_mut(TEXT_KEY) {
                Some(Value::String(existing)) => existing.push_str(&text),
                _ => {
                    container.insert(key, Value::String(text));
                }
            }
            return;
        }

        match value {
            Value::Array(items) => {
                for item in items {
                    accumulate(container, key.clone(), as_node(item));
                }
            }
            other => accumulate(container, key, as_node(other)),
        }
    }

    fn inject_replace_entries(
        &self,
        state: &TransformState<'_>,
        field: &Field,
        container: &mut Map<String, Value>,
        entries: Map<String, Value>,
    ) {
        for (key, value) in entries {
            self.set_field(state, field, container, key, value);
        }
    }

    /// An included document's element is renamed to the including field
    fn convert_included(&self, _path: &str, value: Value) -> Value {
        match value {
            Value::Object(map) if document_element(&map).is_some() => {
                map.into_iter().next().map(|(_, element)| element).unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    fn format(&self, value: &Value) -> Result<String> {
        let mut writer = if self.pretty {
            Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
        } else {
            Writer::new(Cursor::new(Vec::new()))
        };
        write_event(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        match value {
            Value::Object(map) => match document_element(map) {
                Some((name, element)) => write_value(&mut writer, name, element)?,
                None => write_element(&mut writer, &self.root, map)?,
            },
            Value::Array(items) => {
                check_name(&self.root)?;
                write_event(&mut writer, Event::Start(BytesStart::new(self.root.as_str())))?;
                for item in items {
                    write_value(&mut writer, LIST_ITEM, item)?;
                }
                write_event(&mut writer, Event::End(BytesEnd::new(self.root.as_str())))?;
            }
            scalar => write_value(&mut writer, &self.root, scalar)?,
        }

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|err| Error::Xml(err.to_string()))
    }

    fn to_plain(&self, value: Value) -> Value {
        to_plain(value)
    }
}

/// A map with a single element entry holding an object names its own document element
fn document_element(map: &Map<String, Value>) -> Option<(&String, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(key, value)| !is_attribute(key) && key.as_str() != TEXT_KEY && value.is_object())
}

fn is_attribute(key: &str) -> bool {
    key.starts_with(ATTRIBUTE_PREFIX)
}

fn plain_key(key: &str) -> &str {
    key.strip_prefix(ATTRIBUTE_PREFIX).unwrap_or(key)
}

/// Append under `key`, turning an existing entry into a list
fn accumulate(container: &mut Map<String, Value>, key: String, value: Value) {
    match container.get_mut(&key) {
        None => {
            container.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Scalars become text nodes; objects and null are kept as they are
fn as_node(value: Value) -> Value {
    match value {
        Value::Bool(_) | Value::Number(_) => Value::String(text_of(&value)),
        other => other,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Strip attribute prefixes so the value can be used as plain data
fn to_plain(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut plain = Map::with_capacity(map.len());
            for (key, value) in map {
                accumulate(&mut plain, plain_key(&key).to_string(), to_plain(value));
            }
            Value::Object(plain)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_plain).collect()),
        other => other,
    }
}

fn check_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(Error::Xml(format!("'{}' is not a valid XML name", name)))
    }
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|err| Error::Xml(err.to_string()))
}

fn write_value(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                write_value(writer, name, item)?;
            }
            Ok(())
        }
        Value::Object(map) => write_element(writer, name, map),
        Value::Null => {
            check_name(name)?;
            write_event(writer, Event::Empty(BytesStart::new(name)))
        }
        scalar => {
            check_name(name)?;
            write_event(writer, Event::Start(BytesStart::new(name)))?;
            write_event(writer, Event::Text(BytesText::new(&text_of(scalar))))?;
            write_event(writer, Event::End(BytesEnd::new(name)))
        }
    }
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    map: &Map<String, Value>,
) -> Result<()> {
    check_name(name)?;
    let mut start = BytesStart::new(name);
    let mut has_content = false;
    for (key, value) in map {
        match key.strip_prefix(ATTRIBUTE_PREFIX) {
            Some(attribute) => {
                check_name(attribute)?;
                start.push_attribute((attribute, text_of(value).as_str()));
            }
            None => has_content = true,
        }
    }

    if !has_content {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for (key, value) in map {
        if is_attribute(key) {
            continue;
        }
        if key == TEXT_KEY {
            write_event(writer, Event::Text(BytesText::new(&text_of(value))))?;
            continue;
        }
        write_value(writer, key, value)?;
    }
    write_event(writer, Event::End(BytesEnd::new(name)))
}
