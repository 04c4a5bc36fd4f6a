//! Error types shared by the flow graph and the transforms.
//!
//! Errors come in two flavours. Configuration errors are raised while a
//! node or pipeline is being built and are always fatal to construction.
//! Per-record errors are raised while a datum is being handled; transforms
//! that expose `skipInvalidInput` can suppress them.

use std::io;
use thiserror::Error;

/// Errors that can occur while building or running a flow.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown transform type: \"{0}\"")]
    UnknownTransform(String),

    #[error("Invalid parameters for {transform}: {message}")]
    InvalidParams {
        transform: &'static str,
        message: String,
    },

    #[error("Invalid input in {transform}: {message}")]
    InvalidInput {
        transform: &'static str,
        message: String,
    },

    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Invalid flow graph: {0}")]
    Graph(String),

    #[error("Data propagation is not completed! No data are available.")]
    NotCompleted,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FlowError {
    /// Shorthand for a configuration error raised by a transform constructor.
    pub fn params(transform: &'static str, message: impl Into<String>) -> Self {
        FlowError::InvalidParams {
            transform,
            message: message.into(),
        }
    }

    /// Shorthand for a per-record error.
    pub fn input(transform: &'static str, message: impl Into<String>) -> Self {
        FlowError::InvalidInput {
            transform,
            message: message.into(),
        }
    }

    /// Returns true if this error was raised while handling a record rather
    /// than while building the flow.
    pub fn is_per_record(&self) -> bool {
        matches!(self, FlowError::InvalidInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FlowError::UnknownTransform("bogus".into());
        assert_eq!(err.to_string(), "Unknown transform type: \"bogus\"");

        let err = FlowError::params("project", "lengths differ");
        assert_eq!(
            err.to_string(),
            "Invalid parameters for project: lengths differ"
        );
        assert!(!err.is_per_record());
    }

    #[test]
    fn test_per_record_classification() {
        let err = FlowError::input("regexExtract", "no match");
        assert!(err.is_per_record());
    }
}
