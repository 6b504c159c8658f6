//! Domain identifier types with validation
//!
//! Newtype wrappers keep EOB identifiers and SQL table names from being mixed up
//! with arbitrary strings.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// ExplanationOfBenefit identifier newtype wrapper
///
/// Identifies the staging row a raw record came from. It is carried into every
/// flat record as the parent reference (`eob_id`).
///
/// # Examples
///
/// ```
/// use eob_curator::domain::ids::EobId;
/// use std::str::FromStr;
///
/// let eob_id = EobId::from_str("a5b1f3c2-eob").unwrap();
/// assert_eq!(eob_id.as_str(), "a5b1f3c2-eob");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EobId(String);

impl EobId {
    /// Creates a new EobId, rejecting blank identifiers
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("EOB ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the EOB ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Identity used for a contained Coverage that carries no `id` of its own
    pub fn fallback_coverage_id(&self) -> String {
        format!("{}-coverage", self.0)
    }
}

impl fmt::Display for EobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn table_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("table name pattern is a valid regex")
    })
}

/// Destination or staging table name, optionally schema-qualified
///
/// Table names end up interpolated into SQL text, so only plain identifiers
/// (`table` or `schema.table`) are accepted.
///
/// # Examples
///
/// ```
/// use eob_curator::domain::ids::TableName;
/// use std::str::FromStr;
///
/// let table = TableName::from_str("fhir_curated.eob_items").unwrap();
/// assert_eq!(table.schema(), Some("fhir_curated"));
/// assert_eq!(table.table(), "eob_items");
///
/// assert!(TableName::from_str("eob_items; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Creates a new TableName, validating the identifier syntax
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if !table_name_pattern().is_match(&name) {
            return Err(format!(
                "Invalid table name '{name}'. Expected 'table' or 'schema.table' using letters, digits and underscores"
            ));
        }
        Ok(Self(name))
    }

    /// Returns the full (possibly qualified) name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema part, if the name is qualified
    pub fn schema(&self) -> Option<&str> {
        self.0.split_once('.').map(|(schema, _)| schema)
    }

    /// Unqualified table part
    pub fn table(&self) -> &str {
        self.0
            .split_once('.')
            .map(|(_, table)| table)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}
