//! The built-in `worldbuilding` template and the no-template fallback
//! inference table.

use crate::types::{
    AllowSet, EntityTypeDef, FieldDef, FieldKind, FolderMappingRule, RelationshipTypeDef, Template,
};

fn field(name: &str, kind: FieldKind, required: bool) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        kind,
        required,
        default: None,
        values: vec![],
        items: None,
    }
}

fn status_field() -> FieldDef {
    FieldDef {
        name: "status".to_string(),
        kind: FieldKind::Enum,
        required: false,
        default: Some(serde_json::json!("draft")),
        values: vec![
            "draft".into(),
            "pending".into(),
            "canon".into(),
            "non-canon".into(),
            "archived".into(),
        ],
        items: None,
    }
}

fn string_array(name: &str) -> FieldDef {
    FieldDef {
        name: name.to_string(),
        kind: FieldKind::Array,
        required: false,
        default: None,
        values: vec![],
        items: Some(FieldKind::String),
    }
}

/// The default template shipped with the binary: a small worldbuilding
/// catalog covering characters, locations, factions, items, and events.
pub fn worldbuilding_template() -> Template {
    Template {
        id: "worldbuilding".into(),
        name: "Worldbuilding".into(),
        version: "1.0.0".into(),
        description: Some("Characters, locations, factions, items, and events.".into()),
        entity_types: vec![
            EntityTypeDef {
                name: "character".into(),
                display_name: Some("Character".into()),
                plural_name: Some("characters".into()),
                fields: vec![
                    field("name", FieldKind::String, true),
                    status_field(),
                    string_array("aliases"),
                    field("description", FieldKind::String, false),
                    field("born", FieldKind::Date, false),
                    field("died", FieldKind::Date, false),
                ],
            },
            EntityTypeDef {
                name: "location".into(),
                display_name: Some("Location".into()),
                plural_name: Some("locations".into()),
                fields: vec![
                    field("name", FieldKind::String, true),
                    status_field(),
                    field("description", FieldKind::String, false),
                    field("population", FieldKind::Number, false),
                ],
            },
            EntityTypeDef {
                name: "faction".into(),
                display_name: Some("Faction".into()),
                plural_name: Some("factions".into()),
                fields: vec![
                    field("name", FieldKind::String, true),
                    status_field(),
                    field("description", FieldKind::String, false),
                    string_array("goals"),
                ],
            },
            EntityTypeDef {
                name: "item".into(),
                display_name: Some("Item".into()),
                plural_name: Some("items".into()),
                fields: vec![
                    field("name", FieldKind::String, true),
                    status_field(),
                    field("description", FieldKind::String, false),
                ],
            },
            EntityTypeDef {
                name: "event".into(),
                display_name: Some("Event".into()),
                plural_name: Some("events".into()),
                fields: vec![
                    field("name", FieldKind::String, true),
                    status_field(),
                    field("description", FieldKind::String, false),
                    field("date", FieldKind::Date, false),
                ],
            },
        ],
        relationship_types: vec![
            RelationshipTypeDef {
                id: "knows".into(),
                description: Some("Two characters are acquainted.".into()),
                source_types: AllowSet::types(&["character"]),
                target_types: AllowSet::types(&["character"]),
                bidirectional: true,
                reverse_id: Some("knows".into()),
            },
            RelationshipTypeDef {
                id: "located_in".into(),
                description: Some("A character resides in a location.".into()),
                source_types: AllowSet::types(&["character"]),
                target_types: AllowSet::types(&["location"]),
                bidirectional: true,
                reverse_id: Some("has_inhabitant".into()),
            },
            RelationshipTypeDef {
                id: "has_inhabitant".into(),
                description: Some("A location houses a character.".into()),
                source_types: AllowSet::types(&["location"]),
                target_types: AllowSet::types(&["character"]),
                bidirectional: true,
                reverse_id: Some("located_in".into()),
            },
            RelationshipTypeDef {
                id: "connected_to".into(),
                description: Some("Two locations are linked.".into()),
                source_types: AllowSet::types(&["location"]),
                target_types: AllowSet::types(&["location"]),
                bidirectional: true,
                reverse_id: Some("connected_to".into()),
            },
            RelationshipTypeDef {
                id: "member_of".into(),
                description: Some("A character belongs to a faction.".into()),
                source_types: AllowSet::types(&["character"]),
                target_types: AllowSet::types(&["faction"]),
                bidirectional: true,
                reverse_id: Some("has_member".into()),
            },
            RelationshipTypeDef {
                id: "has_member".into(),
                description: Some("A faction counts a character among its members.".into()),
                source_types: AllowSet::types(&["faction"]),
                target_types: AllowSet::types(&["character"]),
                bidirectional: true,
                reverse_id: Some("member_of".into()),
            },
            RelationshipTypeDef {
                id: "owns".into(),
                description: Some("A character possesses an item.".into()),
                source_types: AllowSet::types(&["character"]),
                target_types: AllowSet::types(&["item"]),
                bidirectional: true,
                reverse_id: Some("owned_by".into()),
            },
            RelationshipTypeDef {
                id: "owned_by".into(),
                description: Some("An item belongs to a character.".into()),
                source_types: AllowSet::types(&["item"]),
                target_types: AllowSet::types(&["character"]),
                bidirectional: true,
                reverse_id: Some("owns".into()),
            },
            RelationshipTypeDef {
                id: "participated_in".into(),
                description: Some("A character took part in an event.".into()),
                source_types: AllowSet::types(&["character"]),
                target_types: AllowSet::types(&["event"]),
                bidirectional: false,
                reverse_id: None,
            },
            RelationshipTypeDef {
                id: "related".into(),
                description: Some("Generic link between any two notes.".into()),
                source_types: AllowSet::any(),
                target_types: AllowSet::any(),
                bidirectional: false,
                reverse_id: None,
            },
        ],
        folder_mappings: vec![
            FolderMappingRule {
                pattern: "**/Characters/**".into(),
                types: vec!["character".into()],
            },
            FolderMappingRule {
                pattern: "**/Locations/**".into(),
                types: vec!["location".into()],
            },
            FolderMappingRule {
                pattern: "**/Factions/**".into(),
                types: vec!["faction".into()],
            },
            FolderMappingRule {
                pattern: "**/Items/**".into(),
                types: vec!["item".into()],
            },
            FolderMappingRule {
                pattern: "**/Events/**".into(),
                types: vec!["event".into()],
            },
        ],
    }
}

/// An edge chosen by the fallback table, with the reverse edge to emit
/// when the pairing is symmetric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEdge {
    pub type_id: &'static str,
    pub reverse_id: Option<&'static str>,
}

/// Relationship inference when no template is active. The table keys on
/// the endpoint entity types; anything unlisted is generic `related`.
pub fn fallback_inference(source_type: &str, target_type: &str) -> FallbackEdge {
    match (source_type, target_type) {
        ("character", "character") => FallbackEdge {
            type_id: "knows",
            reverse_id: Some("knows"),
        },
        ("character", "location") => FallbackEdge {
            type_id: "located_in",
            reverse_id: Some("has_inhabitant"),
        },
        ("location", "location") => FallbackEdge {
            type_id: "connected_to",
            reverse_id: Some("connected_to"),
        },
        ("character", "faction") => FallbackEdge {
            type_id: "member_of",
            reverse_id: None,
        },
        _ => FallbackEdge {
            type_id: "related",
            reverse_id: None,
        },
    }
}
