//! Polymorphic field resolvers
//!
//! FHIR declares many fields as "a single object, a list of objects, or
//! absent", and real staging data mixes all three. Every raw field is first
//! classified into a [`FieldShape`]; resolvers then match on it exhaustively.
//!
//! Resolvers never fail. An unexpected shape yields the canonical empty value
//! wrapped in a [`Resolved`] whose `degraded` flag is set, so callers can log
//! it and tests can assert it.

use crate::domain::records::Coding;
use serde_json::{Map, Value};

/// Shape of a raw JSON field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldShape<'a> {
    /// Missing or `null`
    Absent,
    /// A single JSON object
    Single(&'a Map<String, Value>),
    /// A JSON array
    Many(&'a [Value]),
    /// Any scalar where an object or array was expected
    Malformed(&'a Value),
}

impl<'a> FieldShape<'a> {
    /// Classify a raw field value
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Object(map)) => Self::Single(map),
            Some(Value::Array(items)) => Self::Many(items),
            Some(other) => Self::Malformed(other),
        }
    }

    /// Whether the field is absent or an empty object/array
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Single(map) => map.is_empty(),
            Self::Many(items) => items.is_empty(),
            Self::Malformed(_) => false,
        }
    }
}

/// Result of a resolver: the canonical value plus whether it had to be defaulted
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Resolved<T> {
    /// A value resolved from a well-formed field
    pub fn clean(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    /// A default substituted for a malformed field
    pub fn degraded(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }

    /// Transform the value, keeping the flag
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            degraded: self.degraded,
        }
    }

    /// Chain a second resolution; the result is degraded if either step was
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Resolved<U>) -> Resolved<U> {
        let next = f(self.value);
        Resolved {
            value: next.value,
            degraded: self.degraded || next.degraded,
        }
    }
}

/// Collects the names of fields whose resolution was degraded
#[derive(Debug, Default)]
pub struct DegradedFields {
    fields: Vec<&'static str>,
}

impl DegradedFields {
    /// Unwrap a resolution, remembering the field if it was degraded
    pub fn take<T>(&mut self, field: &'static str, resolved: Resolved<T>) -> T {
        if resolved.degraded {
            self.mark(field);
        }
        resolved.value
    }

    /// Record a field that was defaulted outside a resolver
    pub fn mark(&mut self, field: &'static str) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }
}

/// A string member of an object
pub fn string_member(map: &Map<String, Value>, key: &str) -> Resolved<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Resolved::clean(None),
        Some(Value::String(s)) => Resolved::clean(Some(s.clone())),
        Some(_) => Resolved::degraded(None),
    }
}

/// An object member of an object
pub fn object_member<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> Resolved<Option<&'a Map<String, Value>>> {
    match FieldShape::of(map.get(key)) {
        FieldShape::Absent => Resolved::clean(None),
        FieldShape::Single(inner) => Resolved::clean(Some(inner)),
        FieldShape::Many(_) | FieldShape::Malformed(_) => Resolved::degraded(None),
    }
}

/// An array field; absent is an empty list
pub fn list_of(value: Option<&Value>) -> Resolved<&[Value]> {
    match FieldShape::of(value) {
        FieldShape::Absent => Resolved::clean(&[]),
        FieldShape::Many(items) => Resolved::clean(items),
        FieldShape::Single(_) | FieldShape::Malformed(_) => Resolved::degraded(&[]),
    }
}

/// Pick the concept object out of a single-or-list field
///
/// A mapping is used directly; for a list the first element is used.
pub fn resolve_concept(value: Option<&Value>) -> Resolved<Option<&Map<String, Value>>> {
    match FieldShape::of(value) {
        FieldShape::Absent => Resolved::clean(None),
        FieldShape::Single(map) => Resolved::clean(Some(map)),
        FieldShape::Many(items) => match items.first() {
            None | Some(Value::Null) => Resolved::clean(None),
            Some(Value::Object(map)) => Resolved::clean(Some(map)),
            Some(_) => Resolved::degraded(None),
        },
        FieldShape::Malformed(_) => Resolved::degraded(None),
    }
}

/// Build a coding triple from a coding object
pub fn coding_from_map(map: &Map<String, Value>) -> Resolved<Coding> {
    let system = string_member(map, "system");
    let code = string_member(map, "code");
    let display = string_member(map, "display");
    let degraded = system.degraded || code.degraded || display.degraded;

    Resolved {
        value: Coding {
            system: system.value,
            code: code.value,
            display: display.value,
        },
        degraded,
    }
}

/// First element of a concept's `coding` array, or the empty triple
pub fn first_coding(concept: &Map<String, Value>) -> Resolved<Coding> {
    match FieldShape::of(concept.get("coding")) {
        FieldShape::Absent => Resolved::clean(Coding::default()),
        FieldShape::Many(items) => match items.first() {
            None => Resolved::clean(Coding::default()),
            Some(Value::Object(map)) => coding_from_map(map),
            Some(_) => Resolved::degraded(Coding::default()),
        },
        FieldShape::Single(_) | FieldShape::Malformed(_) => {
            Resolved::degraded(Coding::default())
        }
    }
}

/// Resolve a coded field to a canonical `{system, code, display}` triple
///
/// Precedence:
/// 1. a mapping: first element of its `coding` array
/// 2. a sequence: the first element, then rule 1
/// 3. absent or anything else: the empty triple
///
/// # Examples
///
/// ```
/// use eob_curator::core::transform::resolve::resolve_coding;
/// use serde_json::json;
///
/// let single = json!({"coding": [{"code": "X"}]});
/// let listed = json!([{"coding": [{"code": "X"}]}]);
/// assert_eq!(resolve_coding(Some(&single)), resolve_coding(Some(&listed)));
/// ```
pub fn resolve_coding(value: Option<&Value>) -> Resolved<Coding> {
    resolve_codeable(value).map(|(coding, _)| coding)
}

/// Like [`resolve_coding`], also returning the concept object that was used
pub fn resolve_codeable(value: Option<&Value>) -> Resolved<(Coding, Option<&Map<String, Value>>)> {
    resolve_concept(value).and_then(|concept| match concept {
        Some(map) => first_coding(map).map(|coding| (coding, Some(map))),
        None => Resolved::clean((Coding::default(), None)),
    })
}

/// First non-empty `reference` string in a single object or list of objects
pub fn resolve_reference(value: Option<&Value>) -> Resolved<Option<String>> {
    match FieldShape::of(value) {
        FieldShape::Absent => Resolved::clean(None),
        FieldShape::Single(map) => reference_of(map),
        FieldShape::Many(items) => {
            let mut degraded = false;
            for item in items {
                match item {
                    Value::Object(map) => {
                        let reference = reference_of(map);
                        degraded |= reference.degraded;
                        if reference.value.is_some() {
                            return Resolved {
                                value: reference.value,
                                degraded,
                            };
                        }
                    }
                    Value::Null => {}
                    _ => degraded = true,
                }
            }
            Resolved {
                value: None,
                degraded,
            }
        }
        FieldShape::Malformed(_) => Resolved::degraded(None),
    }
}

fn reference_of(map: &Map<String, Value>) -> Resolved<Option<String>> {
    string_member(map, "reference").map(|reference| reference.filter(|r| !r.is_empty()))
}
