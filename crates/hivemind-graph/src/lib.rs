//! hivemind-graph — notes in, nodes and typed edges out.
//!
//! The [`GraphBuilder`] is the only writer of the in-memory
//! [`VaultGraph`] projection and drives every durable mutation through
//! the storage engine, keeping the two consistent. Edges are derived
//! from wikilinks through relationship inference against the active
//! template (or the built-in fallback table).

pub mod builder;
pub mod graph;
pub mod infer;

pub use builder::{BuildStats, GraphBuilder};
pub use graph::{GraphNode, VaultGraph};
pub use infer::{infer_relationship_type, InferredEdge};

use hivemind_db::DbError;
use hivemind_error::DomainError;
use hivemind_template::TemplateError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<GraphError> for hivemind_error::Error {
    fn from(value: GraphError) -> Self {
        match value {
            GraphError::Db(e) => e.into(),
            other => DomainError::Graph {
                message: other.to_string(),
            }
            .into(),
        }
    }
}
