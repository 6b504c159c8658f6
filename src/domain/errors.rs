//! Domain error types
//!
//! This module defines the error hierarchy for eob-curator. Errors are
//! domain-specific and don't expose third-party types.
//!
//! Two layers exist:
//! - [`EtlError`] is returned by fallible operations of the pipeline shell
//!   (configuration, sources, sinks).
//! - [`DecodeError`] and [`ExtractionError`] describe why a single raw record or a
//!   single item/contained entry was dropped by the flattening core. They never
//!   abort a batch; the batch driver logs and counts them.

use thiserror::Error;

/// Main error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A raw document could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A single item or contained entry could not be flattened
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Errors raised while reading staging records
    #[error("Source error: {0}")]
    Source(String),

    /// Errors raised while appending curated records
    #[error("Sink error: {0}")]
    Sink(String),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Reasons a raw record's document cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The document is a string that is not valid JSON
    #[error("document is not valid JSON: {0}")]
    NotJson(String),

    /// The document decoded to something other than a JSON object
    #[error("document decoded to {0}, expected an object")]
    NotAnObject(&'static str),

    /// The document is neither an object nor a JSON-encoded string
    #[error("unsupported document representation: {0}")]
    UnsupportedDocument(&'static str),
}

impl DecodeError {
    /// Short, stable name used as the `error_kind` log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotJson(_) => "not_json",
            Self::NotAnObject(_) => "not_an_object",
            Self::UnsupportedDocument(_) => "unsupported_document",
        }
    }
}

/// Reasons a single item or contained entry is skipped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// The entry itself is not a JSON object
    #[error("entry is {0}, expected an object")]
    NotAnObject(&'static str),

    /// A scalar field is present but cannot be coerced to the curated type
    #[error("field '{field}' cannot be coerced to {expected}: {found}")]
    Coercion {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A list field contains an entry of the wrong shape
    #[error("field '{field}' entry {index} is {found}, expected an object")]
    InvalidEntry {
        field: String,
        index: usize,
        found: &'static str,
    },

    /// The entry's identity field is present but unusable
    #[error("identity field '{field}' is {found}, expected a string")]
    InvalidIdentity { field: String, found: &'static str },
}

impl ExtractionError {
    /// Short, stable name used as the `error_kind` log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAnObject(_) => "not_an_object",
            Self::Coercion { .. } => "coercion",
            Self::InvalidEntry { .. } => "invalid_entry",
            Self::InvalidIdentity { .. } => "invalid_identity",
        }
    }

    /// Prefix the field path with a parent field name
    pub fn within(self, parent: &str) -> Self {
        match self {
            Self::Coercion {
                field,
                expected,
                found,
            } => Self::Coercion {
                field: format!("{parent}.{field}"),
                expected,
                found,
            },
            Self::InvalidEntry {
                field,
                index,
                found,
            } => Self::InvalidEntry {
                field: format!("{parent}.{field}"),
                index,
                found,
            },
            other => other,
        }
    }
}

/// Human-readable name of a JSON value's type, for error messages
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for EtlError {
    fn from(err: toml::de::Error) -> Self {
        EtlError::Configuration(format!("TOML parse error: {err}"))
    }
}
