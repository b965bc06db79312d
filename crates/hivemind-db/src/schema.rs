//! Relation definitions and the schema version marker.

use std::collections::BTreeMap;

use cozo::{DataValue, Db, MemStorage, ScriptMutability};

use crate::DbError;

/// Bumped on any relation-shape change. A store written by a newer
/// version refuses to load; an older one triggers a rebuild from the
/// vault.
pub const SCHEMA_VERSION: u32 = 1;

pub(crate) const RELATIONS: &[&str] = &["nodes", "relationships", "meta"];

const CREATE_NODES: &str = ":create nodes {
    id: String
    =>
    entity_type: String,
    status: String?,
    title: String,
    body: String,
    frontmatter: String,
    path: String,
    size: Int,
    created_at: String?,
    modified_at: String?
}";

const CREATE_RELATIONSHIPS: &str = ":create relationships {
    source_id: String,
    target_id: String,
    type_id: String
    =>
    properties: String?
}";

const CREATE_META: &str = ":create meta { key: String => value: String }";

pub(crate) fn create_schema(db: &Db<MemStorage>) -> Result<(), DbError> {
    for script in [CREATE_NODES, CREATE_RELATIONSHIPS, CREATE_META] {
        db.run_script(script, BTreeMap::new(), ScriptMutability::Mutable)
            .map_err(|e| DbError::Cozo(e.to_string()))?;
    }
    write_schema_version(db, SCHEMA_VERSION)
}

pub(crate) fn write_schema_version(db: &Db<MemStorage>, version: u32) -> Result<(), DbError> {
    let mut params = BTreeMap::new();
    params.insert(
        "value".to_string(),
        DataValue::Str(version.to_string().into()),
    );
    db.run_script(
        r#"?[key, value] <- [["schema_version", $value]] :put meta {key => value}"#,
        params,
        ScriptMutability::Mutable,
    )
    .map_err(|e| DbError::Cozo(e.to_string()))?;
    Ok(())
}

pub(crate) fn read_schema_version(db: &Db<MemStorage>) -> Result<Option<u32>, DbError> {
    let result = db
        .run_script(
            r#"?[value] := *meta{key, value}, key = "schema_version""#,
            BTreeMap::new(),
            ScriptMutability::Immutable,
        )
        .map_err(|e| DbError::Cozo(e.to_string()))?;
    Ok(result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|v| v.get_str())
        .and_then(|s| s.parse().ok()))
}
