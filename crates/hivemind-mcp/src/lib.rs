//! hivemind-mcp — the tool surface the MCP transport exposes.
//!
//! Tools are generated from the active template (`query_<type>` and
//! `list_<type>` per entity type) next to a small fixed table
//! (`search_vault`, `rebuild_index`, `get_vault_stats`). This crate
//! models the logical contract (names, descriptions, JSON input
//! schemas, dispatch, argument validation) and leaves the JSON-RPC
//! envelope to the transport layer.

pub mod dispatch;
pub mod generate;
pub mod tooldef;
pub mod validate;

pub use dispatch::{Reindex, ToolDispatcher};
pub use generate::{generate_tools, fixed_tools, FIXED_TOOL_NAMES};
pub use tooldef::ToolDef;
pub use validate::validate_args;

use hivemind_db::DbError;
use hivemind_error::DomainError;
use hivemind_rag::RagError;
use hivemind_template::TemplateError;

/// Typed tool failures; always returned to the caller, never fatal to
/// the serving loop.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {message}")]
    InvalidArgs { tool: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("generated tool '{0}' collides with a fixed tool name")]
    NameCollision(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("rebuild failed: {0}")]
    Rebuild(String),
}

impl From<ToolError> for hivemind_error::Error {
    fn from(value: ToolError) -> Self {
        DomainError::Tool {
            message: value.to_string(),
        }
        .into()
    }
}
