//! Template definition data model.
//!
//! These types deserialize directly from the JSON shapes users put in
//! `hivemind.config.json` (inline templates) or a standalone template
//! file, hence the camelCase field names.

use serde::{Deserialize, Serialize};

/// A named, versioned bundle of entity- and relationship-type
/// definitions. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    pub relationship_types: Vec<RelationshipTypeDef>,
    #[serde(default)]
    pub folder_mappings: Vec<FolderMappingRule>,
}

impl Template {
    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeDef> {
        self.entity_types.iter().find(|et| et.name == name)
    }

    pub fn relationship_type(&self, id: &str) -> Option<&RelationshipTypeDef> {
        self.relationship_types.iter().find(|rt| rt.id == id)
    }
}

/// Schema for one entity type; notes declare it via `type:` in
/// frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDef {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub plural_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl EntityTypeDef {
    /// Human-facing singular form, falling back to the raw name.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Human-facing plural form, falling back to `<name>s`.
    pub fn plural(&self) -> String {
        self.plural_name
            .clone()
            .unwrap_or_else(|| format!("{}s", self.name))
    }
}

/// A single frontmatter field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Allowed values; only meaningful for `enum` fields.
    #[serde(default)]
    pub values: Vec<String>,
    /// Element base type; only meaningful for `array` fields.
    #[serde(default)]
    pub items: Option<FieldKind>,
}

/// The base types fields can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Enum,
    Array,
    Date,
    Record,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Enum => "enum",
            FieldKind::Array => "array",
            FieldKind::Date => "date",
            FieldKind::Record => "record",
        }
    }
}

/// Which entity types a relationship endpoint admits: an explicit list,
/// or the wildcard `"any"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowSet {
    Any(AnyMarker),
    Types(Vec<String>),
}

/// Serde marker for the literal string `"any"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnyMarker {
    #[serde(rename = "any")]
    Any,
}

impl AllowSet {
    pub fn any() -> Self {
        AllowSet::Any(AnyMarker::Any)
    }

    pub fn types(list: &[&str]) -> Self {
        AllowSet::Types(list.iter().map(|s| s.to_string()).collect())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, AllowSet::Any(_))
    }

    pub fn allows(&self, entity_type: &str) -> bool {
        match self {
            AllowSet::Any(_) => true,
            AllowSet::Types(list) => list.iter().any(|t| t == entity_type),
        }
    }
}

/// A named, directional edge kind with allow-sets restricting its
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipTypeDef {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_types: AllowSet,
    pub target_types: AllowSet,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub reverse_id: Option<String>,
}

impl RelationshipTypeDef {
    /// How constrained this type is: one point per explicit allow-set.
    /// Used by relationship inference to prefer narrow types over
    /// wildcard ones.
    pub fn specificity(&self) -> u8 {
        u8::from(!self.source_types.is_any()) + u8::from(!self.target_types.is_any())
    }
}

/// Associates a glob pattern with the entity types expected under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMappingRule {
    pub pattern: String,
    pub types: Vec<String>,
}
