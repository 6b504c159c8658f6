//! Item flattening rule
//!
//! Expands the `item` array of one EOB document into one [`FlatItemRecord`]
//! per entry, in source order. Each item is extracted independently: an item
//! that fails is reported as a dropped entry and the remaining items are still
//! emitted. A record is never half-populated.

use super::resolve::{
    list_of, object_member, resolve_codeable, resolve_coding, resolve_reference, string_member,
    DegradedFields, FieldShape,
};
use super::scalar::{coerce_float, coerce_float_or, coerce_integer, round_trip_timestamp};
use super::{DroppedEntry, FlattenRule, RuleOutput};
use crate::domain::errors::{json_type_name, ExtractionError};
use crate::domain::ids::EobId;
use crate::domain::raw::Document;
use crate::domain::records::{
    AdjudicationEntry, FlatItemRecord, Money, ProductCoding, ServicePeriod,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Flattens EOB line items
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemRule;

impl FlattenRule for ItemRule {
    type Output = FlatItemRecord;

    fn name(&self) -> &'static str {
        "items"
    }

    fn flatten(
        &self,
        eob_id: &EobId,
        document: &Document,
        loaded_at: DateTime<Utc>,
    ) -> RuleOutput<FlatItemRecord> {
        let items = list_of(document.get("item"));
        if items.degraded {
            tracing::debug!(eob_id = %eob_id, "item field is not a list, no items flattened");
        }

        let mut output = RuleOutput::default();
        for (index, item) in items.value.iter().enumerate() {
            match flatten_item(eob_id, item, loaded_at) {
                Ok(record) => output.records.push(record),
                Err(error) => output.dropped.push(DroppedEntry { index, error }),
            }
        }
        output
    }
}

/// Build the flat record for a single item
///
/// # Errors
///
/// Returns an [`ExtractionError`] when the item is not an object, when a
/// numeric or sequence field is present but cannot be coerced, or when
/// `adjudication`/`amount` contain non-object entries.
pub fn flatten_item(
    eob_id: &EobId,
    item: &Value,
    loaded_at: DateTime<Utc>,
) -> Result<FlatItemRecord, ExtractionError> {
    let item = match item {
        Value::Object(map) => map,
        other => return Err(ExtractionError::NotAnObject(json_type_name(other))),
    };

    let mut degraded = DegradedFields::default();

    let sequence = coerce_integer("sequence", first_or_self(item.get("sequence")))?;
    let diagnosis_sequence =
        coerce_integer("diagnosisSequence", first_or_self(item.get("diagnosisSequence")))?;

    let category = degraded.take("category", resolve_coding(item.get("category")));

    let (product_coding, product_concept) =
        degraded.take("productOrService", resolve_codeable(item.get("productOrService")));
    let product_text = match product_concept {
        Some(concept) => degraded.take("productOrService.text", string_member(concept, "text")),
        None => None,
    };
    let product = ProductCoding::from_coding(product_coding, product_text);

    let location = degraded.take("location", resolve_coding(location_field(item)));

    let service_period = match degraded.take("servicedPeriod", object_member(item, "servicedPeriod"))
    {
        Some(period) => ServicePeriod {
            start: round_trip_timestamp(period.get("start")),
            end: round_trip_timestamp(period.get("end")),
        },
        None => ServicePeriod::default(),
    };

    let encounter = degraded.take("encounter", resolve_reference(item.get("encounter")));

    let (quantity, unit_price) = quantity_and_unit_price(item, &mut degraded)?;
    let net = net_amount(item, &mut degraded)?;
    let adjudication = adjudication_entries(item, &mut degraded)?;
    let amount = amount_entries(item, &mut degraded)?;

    if !degraded.is_empty() {
        tracing::debug!(
            eob_id = %eob_id,
            sequence = ?sequence,
            fields = ?degraded.fields(),
            "Malformed item fields defaulted to empty values"
        );
    }

    Ok(FlatItemRecord {
        eob_id: eob_id.to_string(),
        sequence,
        diagnosis_sequence,
        category,
        product,
        service_period,
        location,
        encounter,
        quantity,
        unit_price,
        net,
        adjudication,
        amount,
        load_timestamp: loaded_at,
    })
}

/// A list field yields its first element; anything else is used as-is
fn first_or_self(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Array(items)) => items.first(),
        other => other,
    }
}

/// `location`, or `locationCodeableConcept` when `location` carries nothing
fn location_field(item: &Map<String, Value>) -> Option<&Value> {
    if FieldShape::of(item.get("location")).is_empty() {
        item.get("locationCodeableConcept")
    } else {
        item.get("location")
    }
}

/// Numeric value of a Money-like field, which may also be a bare number
fn money_value<'a>(value: Option<&'a Value>) -> Option<&'a Value> {
    match value {
        Some(Value::Object(money)) => money.get("value"),
        other => other,
    }
}

fn quantity_and_unit_price(
    item: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<(Option<f64>, Option<f64>), ExtractionError> {
    let quantity = match item.get("quantity") {
        None | Some(Value::Null) => return Ok((None, None)),
        Some(Value::Object(quantity)) => quantity,
        Some(other) => {
            return Err(ExtractionError::Coercion {
                field: "quantity".to_string(),
                expected: "an object",
                found: json_type_name(other).to_string(),
            })
        }
    };

    let value = coerce_float_or("quantity.value", quantity.get("value"), 0.0)?;

    let unit_price = match degraded.take("unitPrice", object_member(item, "unitPrice")) {
        Some(price) => coerce_float_or("unitPrice.value", price.get("value"), 0.0)?,
        None => coerce_float_or(
            "quantity.unitPrice",
            money_value(quantity.get("unitPrice")),
            0.0,
        )?,
    };

    Ok((Some(value), Some(unit_price)))
}

/// The item's own `net`, or the first `total[].amount` when `net` is absent
fn net_amount(
    item: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Money, ExtractionError> {
    if let Some(net) = item.get("net").filter(|net| !net.is_null()) {
        return match net {
            Value::Object(net) => money("net", net, degraded),
            _ => {
                degraded.mark("net");
                Ok(Money::default())
            }
        };
    }

    let totals = degraded.take("total", list_of(item.get("total")));
    let amount = match totals.first() {
        Some(Value::Object(total)) => degraded.take("total.amount", object_member(total, "amount")),
        Some(Value::Null) | None => None,
        Some(_) => {
            degraded.mark("total");
            None
        }
    };

    match amount {
        Some(amount) => money("total.amount", amount, degraded),
        None => Ok(Money::default()),
    }
}

fn money(
    field: &'static str,
    money: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Money, ExtractionError> {
    Ok(Money {
        value: coerce_float("value", money.get("value")).map_err(|e| e.within(field))?,
        currency: degraded.take(field, string_member(money, "currency")),
    })
}

fn adjudication_entries(
    item: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Vec<AdjudicationEntry>, ExtractionError> {
    let entries = degraded.take("adjudication", list_of(item.get("adjudication")));
    let mut adjudication = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let entry = object_entry("adjudication", index, entry)?;
        let category = degraded.take("adjudication.category", resolve_coding(entry.get("category")));

        let amount = match degraded.take("adjudication.amount", object_member(entry, "amount")) {
            Some(amount) => money("adjudication.amount", amount, degraded)?,
            None => Money::default(),
        };

        adjudication.push(AdjudicationEntry {
            code: category.code,
            display: category.display,
            value: amount.value,
            currency: amount.currency,
        });
    }

    Ok(adjudication)
}

fn amount_entries(
    item: &Map<String, Value>,
    degraded: &mut DegradedFields,
) -> Result<Vec<Money>, ExtractionError> {
    let entries = degraded.take("amount", list_of(item.get("amount")));
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| money("amount", object_entry("amount", index, entry)?, degraded))
        .collect()
}

fn object_entry<'a>(
    field: &str,
    index: usize,
    entry: &'a Value,
) -> Result<&'a Map<String, Value>, ExtractionError> {
    entry.as_object().ok_or_else(|| ExtractionError::InvalidEntry {
        field: field.to_string(),
        index,
        found: json_type_name(entry),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eob_id() -> EobId {
        EobId::new("eob-1").unwrap()
    }

    fn flatten(item: Value) -> Result<FlatItemRecord, ExtractionError> {
        flatten_item(&eob_id(), &item, Utc::now())
    }

    #[test]
    fn test_full_item() {
        let record = flatten(json!({
            "sequence": 1,
            "diagnosisSequence": [2, 3],
            "category": {"coding": [{"system": "http://cat", "code": "1", "display": "Medical care"}]},
            "productOrService": {
                "coding": [{"system": "http://snomed.info/sct", "code": "185349003", "display": "Check up"}],
                "text": "Encounter for check up"
            },
            "servicedPeriod": {"start": "2019-08-30T14:12:55-04:00", "end": "2019-08-30T14:27:55Z"},
            "locationCodeableConcept": {"coding": [{"code": "21", "display": "Inpatient"}]},
            "encounter": [{"reference": "urn:uuid:enc-1"}],
            "quantity": {"value": 2},
            "unitPrice": {"value": 50.0, "currency": "USD"},
            "net": {"value": 100.0, "currency": "USD"}
        }))
        .unwrap();

        assert_eq!(record.eob_id, "eob-1");
        assert_eq!(record.sequence, Some(1));
        assert_eq!(record.diagnosis_sequence, Some(2));
        assert_eq!(record.category.display.as_deref(), Some("Medical care"));
        assert_eq!(record.product.code.as_deref(), Some("185349003"));
        assert_eq!(record.product.text.as_deref(), Some("Encounter for check up"));
        assert_eq!(
            record.service_period.start.as_deref(),
            Some("2019-08-30T14:12:55-04:00")
        );
        assert_eq!(
            record.service_period.end.as_deref(),
            Some("2019-08-30T14:27:55+00:00")
        );
        assert_eq!(record.location.code.as_deref(), Some("21"));
        assert_eq!(record.encounter.as_deref(), Some("urn:uuid:enc-1"));
        assert_eq!(record.quantity, Some(2.0));
        assert_eq!(record.unit_price, Some(50.0));
        assert_eq!(record.net.value, Some(100.0));
        assert_eq!(record.net.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_sequence_as_list() {
        let record = flatten(json!({"sequence": [4, 5]})).unwrap();
        assert_eq!(record.sequence, Some(4));

        let empty = flatten(json!({"sequence": []})).unwrap();
        assert_eq!(empty.sequence, None);
    }

    #[test]
    fn test_non_integer_sequence_drops_item() {
        let err = flatten(json!({"sequence": "first"})).unwrap_err();
        assert_eq!(err.kind(), "coercion");
    }

    #[test]
    fn test_item_not_an_object() {
        assert_eq!(
            flatten(json!("item")).unwrap_err(),
            ExtractionError::NotAnObject("a string")
        );
    }

    #[test]
    fn test_location_prefers_location_field() {
        let record = flatten(json!({
            "location": {"coding": [{"code": "A"}]},
            "locationCodeableConcept": {"coding": [{"code": "B"}]}
        }))
        .unwrap();
        assert_eq!(record.location.code.as_deref(), Some("A"));

        let fallback = flatten(json!({
            "location": [],
            "locationCodeableConcept": [{"coding": [{"code": "B"}]}]
        }))
        .unwrap();
        assert_eq!(fallback.location.code.as_deref(), Some("B"));
    }

    #[test]
    fn test_no_quantity_means_null_quantity_and_price() {
        let record = flatten(json!({"unitPrice": {"value": 10}})).unwrap();
        assert_eq!(record.quantity, None);
        assert_eq!(record.unit_price, None);
    }

    #[test]
    fn test_quantity_defaults_to_zero_when_present() {
        let record = flatten(json!({"quantity": {}})).unwrap();
        assert_eq!(record.quantity, Some(0.0));
        assert_eq!(record.unit_price, Some(0.0));
    }

    #[test]
    fn test_legacy_unit_price_under_quantity() {
        let record = flatten(json!({"quantity": {"value": 3, "unitPrice": 12.5}})).unwrap();
        assert_eq!(record.quantity, Some(3.0));
        assert_eq!(record.unit_price, Some(12.5));
    }

    #[test]
    fn test_net_zero_is_numeric() {
        let record = flatten(json!({"net": {"value": 0, "currency": "USD"}})).unwrap();
        assert_eq!(record.net.value, Some(0.0));
    }

    #[test]
    fn test_net_preferred_over_total() {
        let record = flatten(json!({
            "net": {"currency": "USD"},
            "total": [{"amount": {"value": 99.0, "currency": "EUR"}}]
        }))
        .unwrap();
        assert_eq!(record.net.value, None);
        assert_eq!(record.net.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_total_used_only_when_net_absent() {
        let record = flatten(json!({
            "total": [
                {"amount": {"value": 42.0, "currency": "USD"}},
                {"amount": {"value": 1.0, "currency": "USD"}}
            ]
        }))
        .unwrap();
        assert_eq!(record.net.value, Some(42.0));
        assert_eq!(record.net.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_unparseable_net_drops_item() {
        let err = flatten(json!({"net": {"value": "lots"}})).unwrap_err();
        assert!(err.to_string().contains("net.value"));
    }

    #[test]
    fn test_adjudication_without_amount_keeps_entry() {
        let record = flatten(json!({
            "adjudication": [
                {"category": {"coding": [{"code": "submitted", "display": "Submitted Amount"}]}},
                {
                    "category": {"coding": [{"code": "benefit"}]},
                    "amount": {"value": 80.0, "currency": "USD"}
                }
            ]
        }))
        .unwrap();

        assert_eq!(record.adjudication.len(), 2);
        assert_eq!(record.adjudication[0].code.as_deref(), Some("submitted"));
        assert_eq!(record.adjudication[0].value, None);
        assert_eq!(record.adjudication[0].currency, None);
        assert_eq!(record.adjudication[1].value, Some(80.0));
    }

    #[test]
    fn test_adjudication_non_object_entry_drops_item() {
        let err = flatten(json!({"adjudication": [{"category": {}}, 5]})).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::InvalidEntry {
                field: "adjudication".to_string(),
                index: 1,
                found: "a number",
            }
        );
    }

    #[test]
    fn test_amount_entries_in_order() {
        let record = flatten(json!({
            "amount": [{"value": 1.5, "currency": "USD"}, {"currency": "USD"}]
        }))
        .unwrap();
        assert_eq!(record.amount.len(), 2);
        assert_eq!(record.amount[0].value, Some(1.5));
        assert_eq!(record.amount[1].value, None);
    }

    #[test]
    fn test_malformed_category_degrades_without_dropping() {
        let record = flatten(json!({"sequence": 1, "category": 7})).unwrap();
        assert!(record.category.is_empty());
        assert_eq!(record.sequence, Some(1));
    }

    #[test]
    fn test_rule_isolates_failing_item() {
        let document = json!({
            "resourceType": "ExplanationOfBenefit",
            "item": [{"sequence": 1}, {"sequence": "x"}, {"sequence": 3}]
        });
        let output = ItemRule.flatten(&eob_id(), document.as_object().unwrap(), Utc::now());

        let sequences: Vec<_> = output.records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![Some(1), Some(3)]);
        assert_eq!(output.dropped.len(), 1);
        assert_eq!(output.dropped[0].index, 1);
        assert!(!output.skipped);
    }

    #[test]
    fn test_rule_without_items() {
        let document = json!({"resourceType": "ExplanationOfBenefit"});
        let output = ItemRule.flatten(&eob_id(), document.as_object().unwrap(), Utc::now());
        assert!(output.records.is_empty());
        assert!(output.dropped.is_empty());
    }
}
