//! Curated flat record types
//!
//! These are the rows written to the curated tables. Field names are the
//! curated schema contract: they serialize to JSON objects with exactly these
//! keys, which sinks map onto destination columns.
//!
//! Records are built once by a flattening rule and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `{system, code, display}` triple taken from a FHIR coding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

impl Coding {
    /// Whether every member is null
    pub fn is_empty(&self) -> bool {
        self.system.is_none() && self.code.is_none() && self.display.is_none()
    }
}

/// Product or service coding plus the concept's free text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCoding {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
    pub text: Option<String>,
}

impl ProductCoding {
    /// Combine a resolved coding with the concept text
    pub fn from_coding(coding: Coding, text: Option<String>) -> Self {
        Self {
            system: coding.system,
            code: coding.code,
            display: coding.display,
            text,
        }
    }
}

/// Service period boundaries as ISO-8601 strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePeriod {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// A monetary amount
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: Option<f64>,
    pub currency: Option<String>,
}

/// One adjudication entry of an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationEntry {
    pub code: Option<String>,
    pub display: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<String>,
}

/// Flat record for one EOB line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatItemRecord {
    /// Parent EOB identifier (not unique per record)
    pub eob_id: String,
    pub sequence: Option<i64>,
    pub diagnosis_sequence: Option<i64>,
    pub category: Coding,
    pub product: ProductCoding,
    pub service_period: ServicePeriod,
    pub location: Coding,
    pub encounter: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub net: Money,
    pub adjudication: Vec<AdjudicationEntry>,
    pub amount: Vec<Money>,
    /// Time the record was created, not a source time
    pub load_timestamp: DateTime<Utc>,
}

/// A `{system, value}` identifier pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierEntry {
    pub system: Option<String>,
    pub value: Option<String>,
}

/// Flat record for one contained Coverage resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatCoverageRecord {
    /// Contained id, or `"<eob_id>-coverage"` when the resource has none
    pub coverage_id: String,
    pub status: Option<String>,
    pub type_code: Option<String>,
    pub type_system: Option<String>,
    pub type_display: Option<String>,
    pub type_codings: Vec<Coding>,
    pub identifier_value: Option<String>,
    pub identifier_system: Option<String>,
    pub identifiers: Vec<IdentifierEntry>,
    pub beneficiary_ref: Option<String>,
    pub payor: Option<String>,
    pub subscriber_id: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    /// Looked up through the parent's insurance list; null when unmatched
    pub focal: Option<bool>,
    pub load_timestamp: DateTime<Utc>,
}
