//! Tool generation from the active template.

use serde_json::json;

use hivemind_template::TemplateRegistry;

use crate::{ToolDef, ToolError};

/// Names reserved by the fixed table; generated tools must not collide.
pub const FIXED_TOOL_NAMES: &[&str] = &["search_vault", "rebuild_index", "get_vault_stats"];

/// The non-generated tools available regardless of template.
pub fn fixed_tools() -> Vec<ToolDef> {
    vec![
        ToolDef::new(
            "search_vault",
            "Hybrid search across the vault: keyword, graph proximity, and optional vector signals.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search text" },
                    "type": { "type": "string", "description": "Restrict to one entity type" },
                    "status": { "type": "string", "description": "Restrict to one canon status" },
                    "relationshipType": {
                        "type": "string",
                        "description": "Keep only notes participating in edges of this type"
                    },
                    "limit": { "type": "integer", "description": "Maximum results" }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        ),
        ToolDef::new(
            "rebuild_index",
            "Drop the index and rebuild it from the files on disk.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        ToolDef::new(
            "get_vault_stats",
            "Node and relationship counts, grouped by entity type.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
    ]
}

/// Emit `query_<type>` and `list_<type>` for every entity type of the
/// active template. Fails if a generated name would shadow a fixed tool.
pub fn generate_tools(registry: &TemplateRegistry) -> Result<Vec<ToolDef>, ToolError> {
    let mut tools = Vec::new();
    for entity_type in registry.entity_types()? {
        let name = &entity_type.name;
        let display = entity_type.display().to_string();
        let plural = entity_type.plural();

        for candidate in [format!("query_{name}"), format!("list_{name}")] {
            if FIXED_TOOL_NAMES.contains(&candidate.as_str()) {
                return Err(ToolError::NameCollision(candidate));
            }
        }

        tools.push(ToolDef::new(
            format!("query_{name}"),
            format!("Fetch one {display} by id or title, with frontmatter and relationships."),
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "Note id (or title, case-insensitive)" },
                    "includeContent": { "type": "boolean", "description": "Include a body excerpt" },
                    "contentLimit": { "type": "integer", "description": "Excerpt length in characters" }
                },
                "required": ["id"],
                "additionalProperties": false
            }),
        ));
        tools.push(ToolDef::new(
            format!("list_{name}"),
            format!("List {plural} with optional status and frontmatter filters."),
            json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string", "description": "Canon status filter" },
                    "limit": { "type": "integer", "description": "Page size" },
                    "offset": { "type": "integer", "description": "Page start" },
                    "filters": {
                        "type": "object",
                        "description": "Frontmatter equality filters, field name to expected value"
                    }
                },
                "additionalProperties": false
            }),
        ));
    }
    Ok(tools)
}
