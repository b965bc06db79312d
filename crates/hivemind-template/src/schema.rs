//! Compiled per-entity-type validators.
//!
//! Each entity type's field list is compiled once at template activation
//! into a flat tagged representation; validation walks the compiled
//! fields with no reflection or re-parsing of the definition.

use std::collections::{BTreeMap, HashSet};

use hivemind_core::{FmMap, FmValue};
use serde::Serialize;

use crate::types::{EntityTypeDef, FieldDef, FieldKind};

/// One rule the frontmatter broke.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The document's `type` does not name this schema's entity type.
    #[error("expected type '{expected}', found {actual:?}")]
    WrongEntityType {
        expected: String,
        actual: Option<String>,
    },

    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}': value '{value}' is not one of {allowed:?}")]
    InvalidEnum {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("field '{field}': expected {expected}, found {actual}")]
    InvalidType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: String,
    kind: FieldKind,
    required: bool,
    default: Option<FmValue>,
    /// Present only for enum fields.
    values: Option<HashSet<String>>,
    allowed_list: Vec<String>,
    /// Element type for array fields, when declared.
    items: Option<FieldKind>,
}

/// A validator compiled from one [`EntityTypeDef`].
///
/// Validation is non-strict on unknown fields (they pass through
/// untouched) and strict on declared ones: a present field must match
/// its base type, a missing required field fails, and a missing
/// defaulted field is substituted.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    entity_type: String,
    fields: Vec<CompiledField>,
}

impl CompiledSchema {
    pub fn compile(def: &EntityTypeDef) -> Self {
        let fields = def.fields.iter().map(CompiledField::compile).collect();
        Self {
            entity_type: def.name.clone(),
            fields,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Validate a frontmatter map against this schema.
    ///
    /// On success returns the normalized map: declared defaults filled
    /// in, unknown fields preserved. On failure returns every violation
    /// found, not just the first.
    pub fn validate(&self, fm: &FmMap) -> Result<FmMap, Vec<Violation>> {
        let mut violations = Vec::new();

        let actual_type = fm.get("type").and_then(|v| v.as_str());
        if actual_type != Some(self.entity_type.as_str()) {
            violations.push(Violation::WrongEntityType {
                expected: self.entity_type.clone(),
                actual: actual_type.map(str::to_string),
            });
        }

        let mut normalized: BTreeMap<String, FmValue> = fm.clone();
        for field in &self.fields {
            match fm.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => field.check(value, &mut violations),
                None => {
                    if let Some(default) = &field.default {
                        normalized.insert(field.name.clone(), default.clone());
                    } else if field.required {
                        violations.push(Violation::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(violations)
        }
    }
}

impl CompiledField {
    fn compile(def: &FieldDef) -> Self {
        let values = match def.kind {
            FieldKind::Enum => Some(def.values.iter().cloned().collect()),
            _ => None,
        };
        Self {
            name: def.name.clone(),
            kind: def.kind,
            required: def.required,
            default: def.default.as_ref().map(FmValue::from_json),
            values,
            allowed_list: def.values.clone(),
            items: def.items,
        }
    }

    fn check(&self, value: &FmValue, violations: &mut Vec<Violation>) {
        match self.kind {
            FieldKind::Enum => match value {
                FmValue::String(s) => {
                    let known = self.values.as_ref().is_some_and(|set| set.contains(s));
                    if !known {
                        violations.push(Violation::InvalidEnum {
                            field: self.name.clone(),
                            value: s.clone(),
                            allowed: self.allowed_list.clone(),
                        });
                    }
                }
                other => violations.push(Violation::InvalidType {
                    field: self.name.clone(),
                    expected: "string",
                    actual: other.type_name(),
                }),
            },
            FieldKind::Array => match value {
                FmValue::Array(items) => {
                    if let Some(elem_kind) = self.items {
                        for item in items {
                            if !base_type_matches(elem_kind, item) {
                                violations.push(Violation::InvalidType {
                                    field: self.name.clone(),
                                    expected: elem_kind.as_str(),
                                    actual: item.type_name(),
                                });
                            }
                        }
                    }
                }
                other => violations.push(Violation::InvalidType {
                    field: self.name.clone(),
                    expected: "array",
                    actual: other.type_name(),
                }),
            },
            kind => {
                if !base_type_matches(kind, value) {
                    violations.push(Violation::InvalidType {
                        field: self.name.clone(),
                        expected: kind.as_str(),
                        actual: value.type_name(),
                    });
                }
            }
        }
    }
}

fn base_type_matches(kind: FieldKind, value: &FmValue) -> bool {
    match kind {
        FieldKind::String => matches!(value, FmValue::String(_)),
        FieldKind::Number => matches!(value, FmValue::Number(_)),
        FieldKind::Boolean => matches!(value, FmValue::Bool(_)),
        FieldKind::Date => matches!(value, FmValue::Date(_) | FmValue::DateTime(_)),
        FieldKind::Record => matches!(value, FmValue::Map(_)),
        FieldKind::Array => matches!(value, FmValue::Array(_)),
        // Enum element checks inside arrays fall back to string-ness.
        FieldKind::Enum => matches!(value, FmValue::String(_)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDef;

    fn character_schema() -> CompiledSchema {
        CompiledSchema::compile(&EntityTypeDef {
            name: "character".into(),
            display_name: None,
            plural_name: None,
            fields: vec![
                FieldDef {
                    name: "name".into(),
                    kind: FieldKind::String,
                    required: true,
                    default: None,
                    values: vec![],
                    items: None,
                },
                FieldDef {
                    name: "status".into(),
                    kind: FieldKind::Enum,
                    required: false,
                    default: Some(serde_json::json!("draft")),
                    values: vec!["draft".into(), "canon".into()],
                    items: None,
                },
                FieldDef {
                    name: "aliases".into(),
                    kind: FieldKind::Array,
                    required: false,
                    default: None,
                    values: vec![],
                    items: Some(FieldKind::String),
                },
                FieldDef {
                    name: "born".into(),
                    kind: FieldKind::Date,
                    required: false,
                    default: None,
                    values: vec![],
                    items: None,
                },
            ],
        })
    }

    fn fm(entries: &[(&str, FmValue)]) -> FmMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn valid_input_gets_defaults_substituted() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("character".into())),
            ("name", FmValue::String("Alice".into())),
        ]);
        let out = schema.validate(&input).unwrap();
        assert_eq!(out.get("status"), Some(&FmValue::String("draft".into())));
        assert_eq!(out.get("name"), Some(&FmValue::String("Alice".into())));
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("character".into())),
            ("name", FmValue::String("Alice".into())),
            ("favorite_color", FmValue::String("teal".into())),
        ]);
        let out = schema.validate(&input).unwrap();
        assert_eq!(
            out.get("favorite_color"),
            Some(&FmValue::String("teal".into()))
        );
    }

    #[test]
    fn missing_required_field_fails() {
        let schema = character_schema();
        let input = fm(&[("type", FmValue::String("character".into()))]);
        let violations = schema.validate(&input).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::MissingField { field } if field == "name")));
    }

    #[test]
    fn enum_rejects_undeclared_values() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("character".into())),
            ("name", FmValue::String("Alice".into())),
            ("status", FmValue::String("legendary".into())),
        ]);
        let violations = schema.validate(&input).unwrap_err();
        assert!(matches!(
            &violations[0],
            Violation::InvalidEnum { value, .. } if value == "legendary"
        ));
    }

    #[test]
    fn wrong_entity_type_is_reported() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("location".into())),
            ("name", FmValue::String("Castle".into())),
        ]);
        let violations = schema.validate(&input).unwrap_err();
        assert!(matches!(
            &violations[0],
            Violation::WrongEntityType { actual: Some(a), .. } if a == "location"
        ));
    }

    #[test]
    fn typed_fields_are_strict() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("character".into())),
            ("name", FmValue::Bool(true)),
            ("born", FmValue::String("long ago".into())),
            ("aliases", FmValue::Array(vec![FmValue::Bool(false)])),
        ]);
        let violations = schema.validate(&input).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations
            .iter()
            .all(|v| matches!(v, Violation::InvalidType { .. })));
    }

    #[test]
    fn date_values_satisfy_date_fields() {
        let schema = character_schema();
        let input = fm(&[
            ("type", FmValue::String("character".into())),
            ("name", FmValue::String("Alice".into())),
            ("born", FmValue::from_scalar_str("1990-04-01")),
        ]);
        assert!(schema.validate(&input).is_ok());
    }
}
