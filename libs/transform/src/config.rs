//! Engine configuration
//!
//! ```yaml
//! format: json
//! pretty: true
//! strict_templates: true
//! expression_cache_size: 1000
//! template_cache_size: 64
//! max_include_depth: 32
//! ```

use crate::error::{Error, Result};
use crate::generator::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Output format used by `process_as_string`
    pub format: OutputFormat,
    /// Pretty-print JSON and XML output
    pub pretty: bool,
    /// Treat template placeholders that evaluate to `null` as errors
    pub strict_templates: bool,
    /// Capacity of the compiled-expression caches
    pub expression_cache_size: usize,
    /// Capacity of the included-template cache
    pub template_cache_size: usize,
    /// Maximum nesting of `@include`
    pub max_include_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            pretty: true,
            strict_templates: true,
            expression_cache_size: tessera_expr::DEFAULT_CACHE_SIZE,
            template_cache_size: 64,
            max_include_depth: 32,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.expression_cache_size == 0 {
            return Err(Error::Config("expression_cache_size must be at least 1".into()));
        }
        if self.template_cache_size == 0 {
            return Err(Error::Config("template_cache_size must be at least 1".into()));
        }
        if self.max_include_depth == 0 {
            return Err(Error::Config("max_include_depth must be at least 1".into()));
        }
        Ok(())
    }
}
