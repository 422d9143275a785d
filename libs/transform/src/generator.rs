//! Output generators
//!
//! The engine builds results as `serde_json` values and hands container
//! construction, field writes and final formatting to a [`Generator`].

use crate::error::Result;
use crate::model::{Field, ObjectNode};
use crate::state::TransformState;
use crate::xml::XmlGenerator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Materializes resolved values into an output representation
pub trait Generator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Create the container for an object node's fields
    fn new_object(&self, _state: &TransformState<'_>, _node: &ObjectNode) -> Map<String, Value> {
        Map::new()
    }

    fn set_field(
        &self,
        _state: &TransformState<'_>,
        _field: &Field,
        container: &mut Map<String, Value>,
        key: String,
        value: Value,
    ) {
        container.insert(key, value);
    }

    /// Splice the entries of a `@replace` field into the container
    fn inject_replace_entries(
        &self,
        _state: &TransformState<'_>,
        _field: &Field,
        container: &mut Map<String, Value>,
        entries: Map<String, Value>,
    ) {
        container.extend(entries);
    }

    /// Adapt the result of an included template for embedding
    fn convert_included(&self, _path: &str, value: Value) -> Value {
        value
    }

    /// Serialize the final result
    fn format(&self, value: &Value) -> Result<String>;

    /// Reduce a value to plain data (used for include and resource parameters)
    fn to_plain(&self, value: Value) -> Value {
        value
    }
}

/// Output format selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Xml,
}

impl OutputFormat {
    /// Generator for this format
    pub fn generator(&self, pretty: bool) -> Box<dyn Generator> {
        match self {
            OutputFormat::Json => Box::new(JsonGenerator { pretty }),
            OutputFormat::Yaml => Box::new(YamlGenerator),
            OutputFormat::Xml => Box::new(XmlGenerator::new(pretty)),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// JSON output, pretty-printed or compact
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonGenerator {
    pub pretty: bool,
}

impl JsonGenerator {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Generator for JsonGenerator {
    fn name(&self) -> &'static str {
        "json"
    }

    fn format(&self, value: &Value) -> Result<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }
}

/// YAML output
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlGenerator;

impl Generator for YamlGenerator {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn format(&self, value: &Value) -> Result<String> {
        Ok(serde_yaml::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_formats() {
        let value = json!({"a": [1, 2]});
        assert_eq!(JsonGenerator::default().format(&value).unwrap(), r#"{"a":[1,2]}"#);
        assert!(JsonGenerator::pretty().format(&value).unwrap().contains('\n'));
    }

    #[test]
    fn test_yaml_format() {
        let text = YamlGenerator.format(&json!({"name": "x", "n": 1})).unwrap();
        assert_eq!(text, "name: x\nn: 1\n");
    }

    #[test]
    fn test_format_names() {
        assert_eq!("YAML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("xml".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert!("toml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.generator(false).name(), "json");
        assert_eq!(OutputFormat::Xml.generator(true).name(), "xml");
    }
}
