//! Error types for the object store

use thiserror::Error;

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, ObjectStoreError>;

/// Object store errors
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Unknown node type: expected <{expected}>, found <{found}>")]
    UnknownNodeType { expected: String, found: String },

    #[error("Missing element <{element}> in <{parent}>")]
    MissingElement { parent: String, element: String },

    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl ObjectStoreError {
    /// Shorthand for an [`ObjectStoreError::InvalidValue`]
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`ObjectStoreError::UnknownNodeType`]
    pub fn unknown_node(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::UnknownNodeType {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
