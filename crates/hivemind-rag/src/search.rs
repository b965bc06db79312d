//! The search engine: candidate collection, fusion, post-filtering.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use hivemind_core::NoteId;
use hivemind_db::Database;

use crate::fusion::{diffuse, fuse, normalize_by_max, FusionWeights};
use crate::RagError;

/// How many keyword candidates seed the fusion.
const KEYWORD_POOL: usize = 50;
const DEFAULT_LIMIT: usize = 20;

/// An optional dense-vector retrieval backend. Absent by default; the
/// engine folds its weight into the other signals when none is
/// configured.
pub trait VectorSource: Send + Sync + std::fmt::Debug {
    /// Top candidates for a query, scores normalised to [0, 1].
    fn search(&self, query: &str, limit: usize) -> Result<Vec<(NoteId, f32)>, RagError>;
}

/// Post-filters applied after fusion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub entity_type: Option<String>,
    pub status: Option<String>,
    /// Keep only nodes participating in at least one edge of this type.
    pub relationship_type: Option<String>,
    /// Keep only one-hop neighbours of this node.
    pub neighbor_of: Option<NoteId>,
    pub limit: Option<usize>,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: NoteId,
    pub score: f32,
    pub title: String,
    pub entity_type: String,
    pub status: Option<String>,
    pub path: String,
}

/// Hybrid search over storage outputs only.
#[derive(Debug)]
pub struct SearchEngine {
    db: Arc<Database>,
    weights: FusionWeights,
    vector: Option<Arc<dyn VectorSource>>,
}

impl SearchEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            weights: FusionWeights::default(),
            vector: None,
        }
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_vector_source(mut self, source: Arc<dyn VectorSource>) -> Self {
        self.vector = Some(source);
        self
    }

    /// Run the fused query and apply post-filters.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, RagError> {
        let keyword_raw = self.db.full_text_search(query, KEYWORD_POOL)?;
        let keyword = normalize_by_max(&keyword_raw);

        let mut neighbor_cache: HashMap<NoteId, Vec<NoteId>> = HashMap::new();
        let graph = diffuse(&keyword, |id| {
            neighbor_cache
                .entry(id.clone())
                .or_insert_with(|| self.db.neighbors(id).unwrap_or_default())
                .clone()
        });

        let (vector, weights) = match &self.vector {
            Some(source) => match source.search(query, KEYWORD_POOL) {
                Ok(hits) => (normalize_by_max(&hits), self.weights),
                Err(e) => {
                    // Degrade to the remaining signals rather than fail.
                    debug!("vector source unavailable: {e}");
                    (Vec::new(), self.weights.without_vector())
                }
            },
            None => (Vec::new(), self.weights.without_vector()),
        };

        let ranked = fuse(&keyword, &graph, &vector, weights);
        self.apply_filters(ranked, filters)
    }

    fn apply_filters(
        &self,
        ranked: Vec<(NoteId, f32)>,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, RagError> {
        let participants = match &filters.relationship_type {
            Some(type_id) => Some(self.db.participants(type_id)?),
            None => None,
        };
        let neighborhood = match &filters.neighbor_of {
            Some(id) => Some(
                self.db
                    .neighbors(id)?
                    .into_iter()
                    .collect::<std::collections::HashSet<_>>(),
            ),
            None => None,
        };
        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT);

        let mut hits = Vec::new();
        for (id, score) in ranked {
            if hits.len() >= limit {
                break;
            }
            if let Some(p) = &participants {
                if !p.contains(&id) {
                    continue;
                }
            }
            if let Some(n) = &neighborhood {
                if !n.contains(&id) {
                    continue;
                }
            }
            let Some(record) = self.db.get_node(&id)? else {
                continue;
            };
            if let Some(ty) = &filters.entity_type {
                if record.entity_type != *ty {
                    continue;
                }
            }
            if let Some(status) = &filters.status {
                if record.status.as_deref() != Some(status.as_str()) {
                    continue;
                }
            }
            hits.push(SearchHit {
                id,
                score,
                title: record.title,
                entity_type: record.entity_type,
                status: record.status,
                path: record.path,
            });
        }
        Ok(hits)
    }
}
