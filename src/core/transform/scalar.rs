//! Scalar coders
//!
//! Safe datetime parsing/serialization and numeric coercion used by the
//! flattening rules.
//!
//! Datetime coders never fail: anything unparseable becomes `None`. Numeric
//! coders distinguish an absent value (`None`) from a present zero (`Some(0.0)`)
//! and report a present-but-unusable value as an [`ExtractionError`], which
//! makes the enclosing item or entry drop out of the batch.

use crate::domain::errors::ExtractionError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat};
use serde_json::Value;

const MAX_FOUND_LEN: usize = 64;

/// Parse a FHIR datetime
///
/// Accepts RFC 3339 timestamps with an offset or a trailing `Z` (UTC), naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` timestamps and bare `YYYY-MM-DD` dates. Naive
/// values are taken as UTC. Returns `None` for anything else.
///
/// # Examples
///
/// ```
/// use eob_curator::core::transform::scalar::parse_datetime;
///
/// let parsed = parse_datetime("2023-01-05T10:00:00Z").unwrap();
/// assert_eq!(parsed.offset().local_minus_utc(), 0);
/// assert!(parse_datetime("not-a-date").is_none());
/// ```
pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }

    let utc = FixedOffset::east_opt(0)?;

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_local_timezone(utc).single();
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0)?.and_local_timezone(utc).single();
    }

    None
}

/// Serialize a timestamp as ISO-8601, passing `None` through
pub fn format_timestamp(timestamp: Option<DateTime<FixedOffset>>) -> Option<String> {
    timestamp.map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, false))
}

/// Parse then reformat a raw JSON value
///
/// Malformed strings and non-string values become `None` instead of leaking
/// the raw source text into the curated table.
pub fn round_trip_timestamp(value: Option<&Value>) -> Option<String> {
    format_timestamp(value.and_then(Value::as_str).and_then(parse_datetime))
}

/// Coerce a JSON value to a float
///
/// - absent, `null`, `false`, blank strings, `[]` and `{}` → `Ok(None)`
/// - numbers, including `0` → `Ok(Some(n))`
/// - numeric strings → parsed
/// - `true` → `1.0`
/// - anything else → [`ExtractionError::Coercion`]
pub fn coerce_float(field: &str, value: Option<&Value>) -> Result<Option<f64>, ExtractionError> {
    let value = match value {
        Some(value) if !is_empty_value(value) => value,
        _ => return Ok(None),
    };

    let coerced = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(_) => Some(1.0),
        _ => None,
    };

    match coerced {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(coercion_error(field, "a number", value)),
    }
}

/// Coerce a JSON value to a float, using `default` when it is absent
pub fn coerce_float_or(
    field: &str,
    value: Option<&Value>,
    default: f64,
) -> Result<f64, ExtractionError> {
    Ok(coerce_float(field, value)?.unwrap_or(default))
}

/// Coerce a JSON value to an integer
///
/// Accepts integers, integral floats (`2.0`) and integer strings. Absent or
/// `null` is `Ok(None)`.
pub fn coerce_integer(field: &str, value: Option<&Value>) -> Result<Option<i64>, ExtractionError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let coerced = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    coerced
        .map(Some)
        .ok_or_else(|| coercion_error(field, "an integer", value))
}

/// Empty payloads carry no amount; numeric zero is not one of them
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(true) | Value::Number(_) => false,
    }
}

fn coercion_error(field: &str, expected: &'static str, value: &Value) -> ExtractionError {
    let mut found = value.to_string();
    if found.len() > MAX_FOUND_LEN {
        let mut cut = MAX_FOUND_LEN;
        while !found.is_char_boundary(cut) {
            cut -= 1;
        }
        found.truncate(cut);
        found.push_str("...");
    }

    ExtractionError::Coercion {
        field: field.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_parse_datetime_with_z_is_utc() {
        let parsed = parse_datetime("2023-01-05T10:00:00Z").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert_eq!(
            format_timestamp(Some(parsed)).unwrap(),
            "2023-01-05T10:00:00+00:00"
        );
    }

    #[test]
    fn test_round_trip_equivalent_instant() {
        let formatted = round_trip_timestamp(Some(&json!("2023-01-05T10:00:00Z"))).unwrap();
        let reparsed = parse_datetime(&formatted).unwrap();
        assert_eq!(reparsed, parse_datetime("2023-01-05T10:00:00+00:00").unwrap());
    }

    #[test]
    fn test_parse_datetime_keeps_offset() {
        let parsed = parse_datetime("2019-08-30T14:12:55-04:00").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -4 * 3600);
        assert_eq!(
            format_timestamp(Some(parsed)).unwrap(),
            "2019-08-30T14:12:55-04:00"
        );
    }

    #[test_case("2023-01-05T10:00:00", "2023-01-05T10:00:00+00:00" ; "naive datetime")]
    #[test_case("2023-01-05T10:00:00.250", "2023-01-05T10:00:00.250+00:00" ; "naive with fraction")]
    #[test_case("2023-01-05", "2023-01-05T00:00:00+00:00" ; "date only")]
    fn test_parse_datetime_naive_forms(input: &str, expected: &str) {
        assert_eq!(format_timestamp(parse_datetime(input)).unwrap(), expected);
    }

    #[test_case("not-a-date" ; "garbage")]
    #[test_case("" ; "empty")]
    #[test_case("2023-13-45T10:00:00Z" ; "out of range")]
    #[test_case("2023-01" ; "partial date")]
    fn test_parse_datetime_invalid(input: &str) {
        assert!(parse_datetime(input).is_none());
    }

    #[test]
    fn test_round_trip_wrong_type_is_none() {
        assert!(round_trip_timestamp(Some(&json!(20230105))).is_none());
        assert!(round_trip_timestamp(Some(&json!({"start": "x"}))).is_none());
        assert!(round_trip_timestamp(None).is_none());
    }

    #[test]
    fn test_format_timestamp_none_passthrough() {
        assert!(format_timestamp(None).is_none());
    }

    #[test]
    fn test_coerce_float_absent_zero_and_value() {
        assert_eq!(coerce_float("value", None).unwrap(), None);
        assert_eq!(coerce_float("value", Some(&json!(null))).unwrap(), None);
        assert_eq!(coerce_float("value", Some(&json!(0))).unwrap(), Some(0.0));
        assert_eq!(coerce_float("value", Some(&json!(12.5))).unwrap(), Some(12.5));
    }

    #[test_case(json!("") ; "empty string")]
    #[test_case(json!("   ") ; "blank string")]
    #[test_case(json!([]) ; "empty array")]
    #[test_case(json!({}) ; "empty object")]
    #[test_case(json!(false) ; "false")]
    fn test_coerce_float_empty_payload_is_none(input: Value) {
        assert_eq!(coerce_float("value", Some(&input)).unwrap(), None);
        assert_eq!(coerce_float_or("value", Some(&input), 0.0).unwrap(), 0.0);
    }

    #[test_case(json!("12.5"), 12.5 ; "numeric string")]
    #[test_case(json!(" 3 "), 3.0 ; "padded string")]
    #[test_case(json!(true), 1.0 ; "boolean true")]
    #[test_case(json!(-7), -7.0 ; "negative integer")]
    fn test_coerce_float_best_effort(input: Value, expected: f64) {
        assert_eq!(coerce_float("value", Some(&input)).unwrap(), Some(expected));
    }

    #[test_case(json!("abc") ; "non numeric string")]
    #[test_case(json!({"value": 1}) ; "object")]
    #[test_case(json!([1.0]) ; "array")]
    #[test_case(json!("NaN") ; "nan")]
    fn test_coerce_float_rejects(input: Value) {
        let err = coerce_float("net.value", Some(&input)).unwrap_err();
        assert_eq!(err.kind(), "coercion");
        assert!(err.to_string().contains("net.value"));
    }

    #[test]
    fn test_coerce_float_or_default() {
        assert_eq!(coerce_float_or("value", None, 0.0).unwrap(), 0.0);
        assert_eq!(coerce_float_or("value", Some(&json!(2)), 0.0).unwrap(), 2.0);
        assert!(coerce_float_or("value", Some(&json!("x")), 0.0).is_err());
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer("sequence", None).unwrap(), None);
        assert_eq!(coerce_integer("sequence", Some(&json!(3))).unwrap(), Some(3));
        assert_eq!(coerce_integer("sequence", Some(&json!(3.0))).unwrap(), Some(3));
        assert_eq!(coerce_integer("sequence", Some(&json!("4"))).unwrap(), Some(4));
        assert!(coerce_integer("sequence", Some(&json!(3.5))).is_err());
        assert!(coerce_integer("sequence", Some(&json!({"a": 1}))).is_err());
    }

    #[test]
    fn test_coercion_error_truncates_long_values() {
        let long = "x".repeat(500);
        let err = coerce_float("value", Some(&json!(long))).unwrap_err();
        match err {
            ExtractionError::Coercion { found, .. } => assert!(found.len() <= MAX_FOUND_LEN + 3),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
