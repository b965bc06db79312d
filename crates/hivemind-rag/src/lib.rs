//! hivemind-rag — hybrid retrieval over the vault store.
//!
//! Three independent signals feed one ranking: BM25 keyword scores from
//! the storage engine, graph proximity (a one-hop diffusion from keyword
//! hits), and an optional dense-vector source. The engine reads only
//! storage outputs and degrades gracefully: with no vector source and no
//! edges it is a plain keyword search.

pub mod fusion;
pub mod search;

pub use fusion::{fuse, FusionWeights};
pub use search::{SearchEngine, SearchFilters, SearchHit, VectorSource};

use hivemind_db::DbError;
use hivemind_error::DomainError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("vector source failed: {0}")]
    Vector(String),
}

impl From<RagError> for hivemind_error::Error {
    fn from(value: RagError) -> Self {
        match value {
            RagError::Db(e) => e.into(),
            other => DomainError::Search {
                message: other.to_string(),
            }
            .into(),
        }
    }
}
