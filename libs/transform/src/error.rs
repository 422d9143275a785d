//! Error types for template parsing and transformation

use crate::loader::LoadError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Transformation errors
///
/// Variants raised while walking a template carry the breadcrumb `path` of the
/// node being processed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid JSON template: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: failed to evaluate '{expression}': {source}")]
    Evaluation {
        path: String,
        expression: String,
        #[source]
        source: tessera_expr::Error,
    },

    #[error("{path}: value of a @replace field must be an object but found {found}")]
    ReplaceNotObject { path: String, found: &'static str },

    #[error("{path}: loop source must be a list or a single value but found {found}")]
    InvalidLoopSource { path: String, found: &'static str },

    #[error("{path}: failed to load resource '{target}': {source}")]
    Resource {
        path: String,
        target: String,
        #[source]
        source: LoadError,
    },

    #[error("{path}: error in included template '{target}': {source}")]
    Include {
        path: String,
        target: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{path}: include nesting exceeded the maximum depth of {depth}")]
    RecursionLimit { path: String, depth: usize },

    #[error("'{0}' is a read-only binding")]
    ReadOnlyBinding(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML write error: {0}")]
    Xml(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(path: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            path: display_path(path),
            message: message.into(),
        }
    }

    /// Breadcrumb of the node that failed, if the error carries one
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Parse { path, .. }
            | Error::Evaluation { path, .. }
            | Error::ReplaceNotObject { path, .. }
            | Error::InvalidLoopSource { path, .. }
            | Error::Resource { path, .. }
            | Error::Include { path, .. }
            | Error::RecursionLimit { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Innermost error, looking through include wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Include { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Root breadcrumb is rendered as `/`
pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
