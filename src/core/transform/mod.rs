//! Flattening engine
//!
//! This module turns raw FHIR ExplanationOfBenefit documents into curated
//! flat records. Two rules are provided, one per curated table:
//!
//! - **Items** ([`items::ItemRule`]): one record per EOB line item
//! - **Coverage** ([`coverage::CoverageRule`]): one record per contained Coverage
//!
//! Rules are pure functions of one decoded document. They are built on the
//! [`scalar`] coders and the polymorphic [`resolve`] helpers.

pub mod coverage;
pub mod items;
pub mod resolve;
pub mod scalar;

use crate::core::export::batch::BatchDriver;
use crate::domain::errors::ExtractionError;
use crate::domain::ids::EobId;
use crate::domain::raw::{Document, RawRecord};
use crate::domain::records::{FlatCoverageRecord, FlatItemRecord};
use crate::domain::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A curated output: one flattening rule and its destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// EOB line items
    Items,
    /// Contained Coverage resources
    Coverage,
}

impl Target {
    /// All targets, in processing order
    pub const ALL: [Target; 2] = [Target::Items, Target::Coverage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Coverage => "coverage",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "items" | "item" => Ok(Self::Items),
            "coverage" | "coverages" => Ok(Self::Coverage),
            _ => Err(EtlError::Configuration(format!(
                "Invalid target: {s}. Expected 'items' or 'coverage'"
            ))),
        }
    }
}

/// An item or contained entry that failed extraction
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedEntry {
    /// Position of the entry in its source array
    pub index: usize,
    pub error: ExtractionError,
}

/// Output of a rule for a single document
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutput<T> {
    pub records: Vec<T>,
    pub dropped: Vec<DroppedEntry>,
    /// The document is not of a type the rule accepts
    pub skipped: bool,
}

impl<T> RuleOutput<T> {
    /// Output for a document the rule does not apply to
    pub fn skipped() -> Self {
        Self {
            records: Vec::new(),
            dropped: Vec::new(),
            skipped: true,
        }
    }
}

impl<T> Default for RuleOutput<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: Vec::new(),
            skipped: false,
        }
    }
}

/// A flattening rule
///
/// Implementations must be pure: the output depends only on the arguments.
/// Failures of individual entries are reported in [`RuleOutput::dropped`],
/// never as a panic or an early return for the whole document.
pub trait FlattenRule {
    /// Flat record type produced by the rule
    type Output: Serialize;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Flatten one decoded document
    fn flatten(
        &self,
        eob_id: &EobId,
        document: &Document,
        loaded_at: DateTime<Utc>,
    ) -> RuleOutput<Self::Output>;
}

/// Flatten the line items of every record in a batch
///
/// Output preserves record order, then item order within each record.
///
/// # Examples
///
/// ```
/// use eob_curator::core::transform::flatten_items;
/// use eob_curator::domain::RawRecord;
/// use serde_json::json;
///
/// let batch = vec![RawRecord::new(
///     "eob-1",
///     json!({
///         "resourceType": "ExplanationOfBenefit",
///         "item": [{"sequence": 1}, {"sequence": 2}]
///     }),
/// )];
///
/// let records = flatten_items(&batch);
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[1].sequence, Some(2));
/// ```
pub fn flatten_items(batch: &[RawRecord]) -> Vec<FlatItemRecord> {
    BatchDriver::new().apply(&items::ItemRule, batch).records
}

/// Flatten the contained Coverage resources of every record in a batch
pub fn flatten_coverage(batch: &[RawRecord]) -> Vec<FlatCoverageRecord> {
    BatchDriver::new().apply(&coverage::CoverageRule, batch).records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_from_str() {
        assert_eq!(Target::from_str("items").unwrap(), Target::Items);
        assert_eq!(Target::from_str("Items").unwrap(), Target::Items);
        assert_eq!(Target::from_str("coverage").unwrap(), Target::Coverage);
        assert_eq!(Target::from_str("COVERAGES").unwrap(), Target::Coverage);
        assert!(Target::from_str("claims").is_err());
    }

    #[test]
    fn test_target_display_round_trip() {
        for target in Target::ALL {
            assert_eq!(Target::from_str(&target.to_string()).unwrap(), target);
        }
    }

    #[test]
    fn test_flatten_items_preserves_order_across_records() {
        let batch = vec![
            RawRecord::new(
                "eob-1",
                json!({"resourceType": "ExplanationOfBenefit", "item": [{"sequence": 1}, {"sequence": 2}]}),
            ),
            RawRecord::from_text(
                "eob-2",
                r#"{"resourceType": "ExplanationOfBenefit", "item": [{"sequence": 1}]}"#,
            ),
        ];

        let records = flatten_items(&batch);
        let keys: Vec<_> = records
            .iter()
            .map(|r| (r.eob_id.as_str(), r.sequence))
            .collect();
        assert_eq!(keys, vec![("eob-1", Some(1)), ("eob-1", Some(2)), ("eob-2", Some(1))]);
    }

    #[test]
    fn test_flatten_coverage_skips_bad_records() {
        let batch = vec![
            RawRecord::from_text("eob-1", "{broken"),
            RawRecord::new(
                "eob-2",
                json!({
                    "resourceType": "ExplanationOfBenefit",
                    "contained": [{"resourceType": "Coverage"}]
                }),
            ),
        ];

        let records = flatten_coverage(&batch);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].coverage_id, "eob-2-coverage");
    }
}
