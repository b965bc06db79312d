//! Frontmatter value model.
//!
//! Frontmatter is schemaless YAML at rest, but the pipeline needs two
//! guarantees the raw `serde_yaml::Value` cannot give: temporal scalars
//! keep their parsed shape through a write-back, and values convert
//! losslessly into JSON for storage and tool payloads. [`FmValue`] is the
//! small tagged representation both sides share.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// A frontmatter map, sorted by key for deterministic equality and
/// write-back output.
pub type FmMap = BTreeMap<String, FmValue>;

/// A single frontmatter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FmValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    /// A calendar date (`2024-01-15`), kept typed so write-back emits the
    /// same shape instead of a quoted string.
    Date(NaiveDate),
    /// A full timestamp with offset (`2024-01-15T10:30:00+02:00`).
    DateTime(DateTime<FixedOffset>),
    String(String),
    Array(Vec<FmValue>),
    Map(BTreeMap<String, FmValue>),
}

impl FmValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FmValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FmValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FmValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FmValue::Null)
    }

    /// Convert to a JSON value for storage blobs and tool results.
    /// Dates render as their canonical string forms.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FmValue::Null => serde_json::Value::Null,
            FmValue::Bool(b) => serde_json::Value::Bool(*b),
            FmValue::Number(n) => serde_json::Value::Number(n.clone()),
            FmValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            FmValue::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            FmValue::String(s) => serde_json::Value::String(s.clone()),
            FmValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(FmValue::to_json).collect())
            }
            FmValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Rebuild from a JSON value (storage blob round-trip). Date-shaped
    /// strings are re-typed so a load-then-write cycle stays faithful.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FmValue::Null,
            serde_json::Value::Bool(b) => FmValue::Bool(*b),
            serde_json::Value::Number(n) => FmValue::Number(n.clone()),
            serde_json::Value::String(s) => FmValue::from_scalar_str(s),
            serde_json::Value::Array(items) => {
                FmValue::Array(items.iter().map(FmValue::from_json).collect())
            }
            serde_json::Value::Object(map) => FmValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), FmValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Type a bare string scalar, promoting temporal shapes.
    pub fn from_scalar_str(s: &str) -> Self {
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return FmValue::Date(d);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return FmValue::DateTime(dt);
        }
        FmValue::String(s.to_string())
    }

    /// Name of the value's base type, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FmValue::Null => "null",
            FmValue::Bool(_) => "boolean",
            FmValue::Number(_) => "number",
            FmValue::Date(_) | FmValue::DateTime(_) => "date",
            FmValue::String(_) => "string",
            FmValue::Array(_) => "array",
            FmValue::Map(_) => "record",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_shapes_are_promoted() {
        assert!(matches!(
            FmValue::from_scalar_str("2024-01-15"),
            FmValue::Date(_)
        ));
        assert!(matches!(
            FmValue::from_scalar_str("2024-01-15T10:30:00Z"),
            FmValue::DateTime(_)
        ));
        assert!(matches!(
            FmValue::from_scalar_str("not a date"),
            FmValue::String(_)
        ));
        // Out-of-range dates are strings, not errors.
        assert!(matches!(
            FmValue::from_scalar_str("2024-13-40"),
            FmValue::String(_)
        ));
    }

    #[test]
    fn json_round_trip_preserves_dates() {
        let date = FmValue::from_scalar_str("1066-10-14");
        let back = FmValue::from_json(&date.to_json());
        assert_eq!(date, back);

        let dt = FmValue::from_scalar_str("2024-01-15T10:30:00+02:00");
        let back = FmValue::from_json(&dt.to_json());
        assert_eq!(dt, back);
    }

    #[test]
    fn nested_values_convert_to_json() {
        let mut map = BTreeMap::new();
        map.insert(
            "tags".to_string(),
            FmValue::Array(vec![
                FmValue::String("hero".into()),
                FmValue::String("royal".into()),
            ]),
        );
        let v = FmValue::Map(map);
        let json = v.to_json();
        assert_eq!(json["tags"][1], serde_json::json!("royal"));
        assert_eq!(FmValue::from_json(&json), v);
    }
}
