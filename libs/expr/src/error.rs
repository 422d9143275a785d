//! Error types for the expression engine

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Expression parse and evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invalid arguments for {function}: {message}")]
    InvalidArguments { function: String, message: String },

    #[error("Undefined value: {0}")]
    UndefinedValue(String),
}

impl Error {
    pub(crate) fn invalid_args(function: &str, message: impl Into<String>) -> Self {
        Error::InvalidArguments {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
