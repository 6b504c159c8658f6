//! Coverage flattening rule
//!
//! Emits one [`FlatCoverageRecord`] per `Coverage` resource contained in an
//! ExplanationOfBenefit, joined by id against the claim's `insurance` list to
//! recover the focal flag.

use super::resolve::{
    coding_from_map, list_of, object_member, resolve_codeable, resolve_reference, string_member,
    DegradedFields,
};
use super::scalar::round_trip_timestamp;
use super::{DroppedEntry, FlattenRule, RuleOutput};
use crate::domain::errors::{json_type_name, ExtractionError};
use crate::domain::ids::EobId;
use crate::domain::raw::{is_explanation_of_benefit, resource_type, Document};
use crate::domain::records::{Coding, FlatCoverageRecord, IdentifierEntry};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Resource type of the contained entries this rule flattens
pub const COVERAGE: &str = "Coverage";

/// Coverage id (without `#`) to the insurance entry's focal flag
pub type FocalMap = HashMap<String, Option<bool>>;

/// Flattens contained Coverage resources
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageRule;

impl FlattenRule for CoverageRule {
    type Output = FlatCoverageRecord;

    fn name(&self) -> &'static str {
        "coverage"
    }

    fn flatten(
        &self,
        eob_id: &EobId,
        document: &Document,
        loaded_at: DateTime<Utc>,
    ) -> RuleOutput<FlatCoverageRecord> {
        if !is_explanation_of_benefit(document) {
            tracing::debug!(
                eob_id = %eob_id,
                resource_type = ?resource_type(document),
                "Skipping non-ExplanationOfBenefit document"
            );
            return RuleOutput::skipped();
        }

        let focal_map = coverage_focal_map(document);
        let mut output = RuleOutput::default();

        for (index, entry) in list_of(document.get("contained")).value.iter().enumerate() {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            if resource_type(entry) != Some(COVERAGE) {
                continue;
            }

            match flatten_coverage_entry(eob_id, entry, &focal_map, loaded_at) {
                Ok(record) => output.records.push(record),
                Err(error) => output.dropped.push(DroppedEntry { index, error }),
            }
        }

        output
    }
}

/// Build the focal lookup from the document's `insurance` entries
///
/// Leading `#` characters are stripped from `coverage.reference`. Entries
/// without a reference are ignored and later duplicates replace earlier ones.
/// A `focal` that is not a boolean is stored as `None`.
pub fn coverage_focal_map(document: &Document) -> FocalMap {
    let mut focal_map = FocalMap::new();

    for entry in list_of(document.get("insurance")).value {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(coverage) = object_member(entry, "coverage").value else {
            continue;
        };
        let Some(reference) = string_member(coverage, "reference").value else {
            continue;
        };

        let key = reference.trim_start_matches('#');
        if key.is_empty() {
            continue;
        }
        focal_map.insert(key.to_string(), entry.get("focal").and_then(Value::as_bool));
    }

    focal_map
}

/// Build the flat record for one contained Coverage resource
///
/// # Errors
///
/// Returns an [`ExtractionError`] when `id` is present but not a string, or
/// when `identifier` or `type.coding` contain non-object entries.
pub fn flatten_coverage_entry(
    eob_id: &EobId,
    entry: &Map<String, Value>,
    focal_map: &FocalMap,
    loaded_at: DateTime<Utc>,
) -> Result<FlatCoverageRecord, ExtractionError> {
    let coverage_id = match entry.get("id") {
        None | Some(Value::Null) => eob_id.fallback_coverage_id(),
        Some(Value::String(id)) if id.is_empty() => eob_id.fallback_coverage_id(),
        Some(Value::String(id)) => id.clone(),
        Some(other) => {
            return Err(ExtractionError::InvalidIdentity {
                field: "id".to_string(),
                found: json_type_name(other),
            })
        }
    };

    let mut degraded = DegradedFields::default();

    let status = degraded.take("status", string_member(entry, "status"));

    let (first_type, type_concept) = degraded.take("type", resolve_codeable(entry.get("type")));
    let type_codings = match type_concept {
        Some(concept) => codings(concept, &mut degraded)?,
        None => Vec::new(),
    };
    let type_text = match type_concept {
        Some(concept) => degraded.take("type.text", string_member(concept, "text")),
        None => None,
    };

    let identifiers = identifiers(entry, &mut degraded)?;
    let first_identifier = identifiers.first().cloned().unwrap_or_default();

    let beneficiary_ref = degraded.take("beneficiary", resolve_reference(entry.get("beneficiary")));
    let subscriber_id = degraded.take("subscriber", resolve_reference(entry.get("subscriber")));
    let payor = first_payor_display(entry, &mut degraded);

    let (period_start, period_end) = match degraded.take("period", object_member(entry, "period")) {
        Some(period) => (
            round_trip_timestamp(period.get("start")),
            round_trip_timestamp(period.get("end")),
        ),
        None => (None, None),
    };

    let focal = focal_map.get(&coverage_id).copied().flatten();

    if !degraded.is_empty() {
        tracing::debug!(
            eob_id = %eob_id,
            coverage_id = %coverage_id,
            fields = ?degraded.fields(),
            "Malformed coverage fields defaulted to empty values"
        );
    }

    Ok(FlatCoverageRecord {
        coverage_id,
        status,
        type_code: first_type.code,
        type_system: first_type.system,
        type_display: first_type.display.or(type_text),
        type_codings,
        identifier_value: first_identifier.value,
        identifier_system: first_identifier.system,
        identifiers,
        beneficiary_ref,
        payor,
        subscriber_id,
        period_start,
        period_end,
        focal,
        load_timestamp: loaded_at,
    })
}

/// Every entry of a concept's `coding` array
fn codings(
    concept: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Vec<Coding>, ExtractionError> {
    let entries = degraded.take("type.coding", list_of(concept.get("coding")));
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(coding) => Ok(degraded.take("type.coding", coding_from_map(coding))),
            other => Err(ExtractionError::InvalidEntry {
                field: "type.coding".to_string(),
                index,
                found: json_type_name(other),
            }),
        })
        .collect()
}

fn identifiers(
    entry: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Vec<IdentifierEntry>, ExtractionError> {
    let entries = degraded.take("identifier", list_of(entry.get("identifier")));
    entries
        .iter()
        .enumerate()
        .map(|(index, identifier)| match identifier {
            Value::Object(identifier) => Ok(IdentifierEntry {
                system: degraded.take("identifier", string_member(identifier, "system")),
                value: degraded.take("identifier", string_member(identifier, "value")),
            }),
            other => Err(ExtractionError::InvalidEntry {
                field: "identifier".to_string(),
                index,
                found: json_type_name(other),
            }),
        })
        .collect()
}

fn first_payor_display(entry: &Map<String, Value>, degraded: &mut DegradedFields) -> Option<String> {
    let payors = degraded.take("payor", list_of(entry.get("payor")));
    match payors.first() {
        Some(Value::Object(payor)) => degraded.take("payor.display", string_member(payor, "display")),
        Some(Value::Null) | None => None,
        Some(_) => {
            degraded.mark("payor");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eob_id() -> EobId {
        EobId::new("EOB-1").unwrap()
    }

    fn flatten(document: Value) -> RuleOutput<FlatCoverageRecord> {
        CoverageRule.flatten(&eob_id(), document.as_object().unwrap(), Utc::now())
    }

    #[test]
    fn test_focal_join() {
        let output = flatten(json!({
            "resourceType": "ExplanationOfBenefit",
            "insurance": [{"coverage": {"reference": "#cov1"}, "focal": true}],
            "contained": [
                {"resourceType": "Coverage", "id": "cov1"},
                {"resourceType": "Coverage", "id": "cov2"}
            ]
        }));

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[0].coverage_id, "cov1");
        assert_eq!(output.records[0].focal, Some(true));
        assert_eq!(output.records[1].focal, None);
    }

    #[test]
    fn test_missing_id_falls_back_to_parent() {
        let output = flatten(json!({
            "resourceType": "ExplanationOfBenefit",
            "contained": [{"resourceType": "Coverage", "status": "active"}]
        }));
        assert_eq!(output.records[0].coverage_id, "EOB-1-coverage");
        assert_eq!(output.records[0].status.as_deref(), Some("active"));
    }

    #[test]
    fn test_non_eob_is_skipped() {
        let output = flatten(json!({
            "resourceType": "Claim",
            "contained": [{"resourceType": "Coverage", "id": "cov1"}]
        }));
        assert!(output.skipped);
        assert!(output.records.is_empty());
    }

    #[test]
    fn test_only_coverage_resources_are_flattened() {
        let output = flatten(json!({
            "resourceType": "ExplanationOfBenefit",
            "contained": [
                {"resourceType": "ServiceRequest", "id": "sr1"},
                "garbage",
                {"resourceType": "Coverage", "id": "cov1"}
            ]
        }));
        assert_eq!(output.records.len(), 1);
        assert!(output.dropped.is_empty());
    }

    #[test]
    fn test_full_coverage_entry() {
        let output = flatten(json!({
            "resourceType": "ExplanationOfBenefit",
            "insurance": [{"coverage": {"reference": "#cov1"}, "focal": false}],
            "contained": [{
                "resourceType": "Coverage",
                "id": "cov1",
                "status": "active",
                "type": {
                    "coding": [
                        {"system": "http://payer-type", "code": "MCPOL"},
                        {"system": "http://other", "code": "X", "display": "Other"}
                    ],
                    "text": "Medicare policy"
                },
                "identifier": [
                    {"system": "http://member", "value": "M-100"},
                    {"system": "http://group", "value": "G-7"}
                ],
                "beneficiary": {"reference": "urn:uuid:patient-1"},
                "subscriber": {"reference": "urn:uuid:patient-2"},
                "payor": [{"display": "Medicare"}, {"display": "Other"}],
                "period": {"start": "2020-01-01", "end": "2020-12-31T00:00:00Z"}
            }]
        }));

        let record = &output.records[0];
        assert_eq!(record.type_code.as_deref(), Some("MCPOL"));
        assert_eq!(record.type_system.as_deref(), Some("http://payer-type"));
        assert_eq!(record.type_display.as_deref(), Some("Medicare policy"));
        assert_eq!(record.type_codings.len(), 2);
        assert_eq!(record.type_codings[1].display.as_deref(), Some("Other"));
        assert_eq!(record.identifier_value.as_deref(), Some("M-100"));
        assert_eq!(record.identifier_system.as_deref(), Some("http://member"));
        assert_eq!(record.identifiers.len(), 2);
        assert_eq!(record.beneficiary_ref.as_deref(), Some("urn:uuid:patient-1"));
        assert_eq!(record.subscriber_id.as_deref(), Some("urn:uuid:patient-2"));
        assert_eq!(record.payor.as_deref(), Some("Medicare"));
        assert_eq!(record.period_start.as_deref(), Some("2020-01-01T00:00:00+00:00"));
        assert_eq!(record.period_end.as_deref(), Some("2020-12-31T00:00:00+00:00"));
        assert_eq!(record.focal, Some(false));
    }

    #[test]
    fn test_malformed_entry_is_isolated() {
        let output = flatten(json!({
            "resourceType": "ExplanationOfBenefit",
            "contained": [
                {"resourceType": "Coverage", "id": 17},
                {"resourceType": "Coverage", "id": "cov2", "identifier": ["M-1"]},
                {"resourceType": "Coverage", "id": "cov3"}
            ]
        }));

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].coverage_id, "cov3");
        assert_eq!(output.dropped.len(), 2);
        assert_eq!(output.dropped[0].error.kind(), "invalid_identity");
        assert_eq!(output.dropped[1].index, 1);
        assert_eq!(output.dropped[1].error.kind(), "invalid_entry");
    }

    #[test]
    fn test_focal_map_rules() {
        let document = json!({
            "insurance": [
                {"coverage": {"reference": "##cov1"}, "focal": true},
                {"coverage": {"display": "no reference"}, "focal": true},
                {"focal": true},
                {"coverage": {"reference": "cov2"}, "focal": "yes"},
                {"coverage": {"reference": "#cov1"}, "focal": false}
            ]
        });
        let focal_map = coverage_focal_map(document.as_object().unwrap());

        assert_eq!(focal_map.len(), 2);
        assert_eq!(focal_map.get("cov1"), Some(&Some(false)));
        assert_eq!(focal_map.get("cov2"), Some(&None));
    }
}
