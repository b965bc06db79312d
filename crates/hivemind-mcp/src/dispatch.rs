//! Routing incoming tool calls to their handlers.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use serde_json::{json, Value};
use tracing::debug;

use hivemind_core::NoteId;
use hivemind_db::{Database, NodeFilters, NodeRecord};
use hivemind_rag::{SearchEngine, SearchFilters};
use hivemind_template::TemplateRegistry;

use crate::generate::{fixed_tools, generate_tools};
use crate::validate::validate_args;
use crate::{ToolDef, ToolError};

const DEFAULT_CONTENT_LIMIT: usize = 1000;
const DEFAULT_LIST_LIMIT: usize = 50;

/// Hook the service installs so `rebuild_index` can reach the indexing
/// pipeline without this crate depending on it.
pub trait Reindex: Send + Sync {
    fn rebuild(&self) -> Result<Value, ToolError>;
}

/// Holds the advertised tool surface and routes calls.
///
/// Dispatch precedence for a call named `N`: a generated `query_<T>`
/// with a known entity-type suffix, then a generated `list_<T>`, then
/// the fixed table, else `UnknownTool`.
pub struct ToolDispatcher {
    registry: Arc<TemplateRegistry>,
    db: Arc<Database>,
    search: Arc<SearchEngine>,
    reindex: Option<Arc<dyn Reindex>>,
    tools: Vec<ToolDef>,
    schemas: HashMap<String, Value>,
}

impl ToolDispatcher {
    /// Generate the tool surface from the active template. Call again
    /// whenever the active template changes.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        db: Arc<Database>,
        search: Arc<SearchEngine>,
        reindex: Option<Arc<dyn Reindex>>,
    ) -> Result<Self, ToolError> {
        let mut tools = generate_tools(&registry)?;
        tools.extend(fixed_tools());
        let schemas = tools
            .iter()
            .map(|t| (t.name.clone(), t.input_schema.clone()))
            .collect();
        Ok(Self {
            registry,
            db,
            search,
            reindex,
            tools,
            schemas,
        })
    }

    /// The advertised `{ name, description, inputSchema }` list.
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    /// Route one call. Always returns a typed response; never panics the
    /// serving loop.
    pub fn dispatch(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        debug!(tool = name, "dispatching tool call");
        if let Some(entity_type) = name.strip_prefix("query_") {
            if self.registry.has_entity_type(entity_type) {
                self.check_args(name, args)?;
                return self.handle_query(entity_type, args);
            }
        }
        if let Some(entity_type) = name.strip_prefix("list_") {
            if self.registry.has_entity_type(entity_type) {
                self.check_args(name, args)?;
                return self.handle_list(entity_type, args);
            }
        }
        match name {
            "search_vault" => {
                self.check_args(name, args)?;
                self.handle_search(args)
            }
            "rebuild_index" => {
                self.check_args(name, args)?;
                match &self.reindex {
                    Some(reindex) => reindex.rebuild(),
                    None => Err(ToolError::Rebuild("no rebuild handler installed".into())),
                }
            }
            "get_vault_stats" => {
                self.check_args(name, args)?;
                let stats = self.db.stats()?;
                Ok(serde_json::to_value(stats).unwrap_or(Value::Null))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn check_args(&self, name: &str, args: &Value) -> Result<(), ToolError> {
        let schema = self
            .schemas
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_args(name, schema, args)
    }

    fn handle_query(&self, entity_type: &str, args: &Value) -> Result<Value, ToolError> {
        let needle = args["id"].as_str().unwrap_or_default();
        let by_id = self.db.get_node(&NoteId::from(needle))?;
        let record = match by_id {
            Some(r) => Some(r),
            None => self.db.get_node_by_title(needle)?,
        }
        .filter(|r| r.entity_type == entity_type)
        .ok_or_else(|| ToolError::NotFound(format!("{entity_type} '{needle}'")))?;

        let include_content = args["includeContent"].as_bool().unwrap_or(false);
        let content_limit = args["contentLimit"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_CONTENT_LIMIT);

        let rels = self.db.relationships(&record.id)?;
        let mut grouped: HashMap<&str, Vec<Value>> = HashMap::new();
        for edge in &rels.outbound {
            grouped.entry(edge.type_id.as_str()).or_default().push(json!({
                "direction": "outbound",
                "other": &edge.target,
            }));
        }
        for edge in &rels.inbound {
            grouped.entry(edge.type_id.as_str()).or_default().push(json!({
                "direction": "inbound",
                "other": &edge.source,
            }));
        }
        // Deterministic key order for callers that diff output.
        let relationships: serde_json::Map<String, Value> = grouped
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(k, v)| (k.to_string(), Value::Array(v)))
            .collect();

        let frontmatter = frontmatter_json(&record);
        let excerpt = include_content
            .then(|| record.body.chars().take(content_limit).collect::<String>());

        let mut result = json!({
            "id": record.id,
            "type": record.entity_type,
            "title": record.title,
            "status": record.status,
            "path": record.path,
            "frontmatter": frontmatter,
            "relationships": relationships,
        });
        if let Some(excerpt) = excerpt {
            result["content"] = Value::String(excerpt);
        }
        Ok(result)
    }

    fn handle_list(&self, entity_type: &str, args: &Value) -> Result<Value, ToolError> {
        let filters = NodeFilters {
            status: args["status"].as_str().map(str::to_string),
            limit: Some(
                args["limit"]
                    .as_u64()
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_LIST_LIMIT),
            ),
            offset: args["offset"].as_u64().unwrap_or(0) as usize,
        };
        let mut records = self.db.nodes_by_type(entity_type, &filters)?;

        if let Some(fm_filters) = args["filters"].as_object() {
            records.retain(|record| {
                let fm = frontmatter_json(record);
                fm_filters
                    .iter()
                    .all(|(key, expected)| fm.get(key) == Some(expected))
            });
        }

        let items: Vec<Value> = records
            .iter()
            .map(|r| {
                json!({
                    "id": &r.id,
                    "title": &r.title,
                    "status": &r.status,
                    "path": &r.path,
                })
            })
            .collect();
        Ok(json!({
            "type": entity_type,
            "count": items.len(),
            "items": items,
        }))
    }

    fn handle_search(&self, args: &Value) -> Result<Value, ToolError> {
        let query = args["query"].as_str().unwrap_or_default();
        let filters = SearchFilters {
            entity_type: args["type"].as_str().map(str::to_string),
            status: args["status"].as_str().map(str::to_string),
            relationship_type: args["relationshipType"].as_str().map(str::to_string),
            neighbor_of: None,
            limit: args["limit"].as_u64().map(|n| n as usize),
        };
        let hits = self.search.search(query, &filters)?;
        let results: Vec<Value> = hits
            .iter()
            .map(|h| {
                json!({
                    "id": &h.id,
                    "score": h.score,
                    "title": &h.title,
                    "type": &h.entity_type,
                    "status": &h.status,
                    "path": &h.path,
                })
            })
            .collect();
        Ok(json!({ "query": query, "count": results.len(), "results": results }))
    }
}

fn frontmatter_json(record: &NodeRecord) -> Value {
    Value::Object(
        record
            .frontmatter
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}
