//! Raw staging records
//!
//! A [`RawRecord`] is one row of the staging table: the EOB identifier and the
//! resource document, which the staging layer may store either as a JSON object
//! or as a JSON-encoded string.

use super::errors::{json_type_name, DecodeError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Resource type expected by rules that only accept claims
pub const EXPLANATION_OF_BENEFIT: &str = "ExplanationOfBenefit";

/// A decoded FHIR resource document
pub type Document = Map<String, Value>;

/// One staging row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Staging identifier of the EOB (becomes `eob_id` on flat records)
    pub id: String,

    /// Resource document: a JSON object or a JSON-encoded string
    pub document: Value,
}

impl RawRecord {
    /// Create a raw record from an id and a document value
    pub fn new(id: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }

    /// Create a raw record whose document is still JSON text
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Value::String(text.into()))
    }

    /// Decode the document into a JSON object
    ///
    /// Objects are borrowed as-is; strings are parsed once and must contain an
    /// object. Every other representation is a [`DecodeError`].
    pub fn decode(&self) -> Result<Cow<'_, Document>, DecodeError> {
        match &self.document {
            Value::Object(map) => Ok(Cow::Borrowed(map)),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(Cow::Owned(map)),
                Ok(other) => Err(DecodeError::NotAnObject(json_type_name(&other))),
                Err(e) => Err(DecodeError::NotJson(e.to_string())),
            },
            other => Err(DecodeError::UnsupportedDocument(json_type_name(other))),
        }
    }
}

/// The `resourceType` of a decoded document, if it is a string
pub fn resource_type(document: &Document) -> Option<&str> {
    document.get("resourceType").and_then(Value::as_str)
}

/// Whether a decoded document is an ExplanationOfBenefit
pub fn is_explanation_of_benefit(document: &Document) -> bool {
    resource_type(document) == Some(EXPLANATION_OF_BENEFIT)
}
