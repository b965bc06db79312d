//! hivemind-core — shared data model for the vault indexing pipeline.
//!
//! Types here are passed between every layer: the parser produces
//! [`Note`]s, the graph builder turns them into nodes and [`Edge`]s, the
//! storage engine persists both, and the tool surface projects them back
//! out. Keep this crate dependency-light; behavior lives in the consuming
//! crates.

pub mod event;
pub mod fm_value;
pub mod note;

pub use event::{ChangeKind, VaultEvent};
pub use fm_value::{FmMap, FmValue};
pub use note::{FileStats, Heading, Note, NoteId, Wikilink};

/// Cancellation primitive threaded through every long-running
/// operation; re-exported so all layers agree on one type.
pub use tokio_util::sync::CancellationToken;

use serde::{Deserialize, Serialize};

/// Workflow marker carried in frontmatter. Opaque to the core except as
/// a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonStatus {
    Draft,
    Pending,
    Canon,
    NonCanon,
    Archived,
}

impl CanonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonStatus::Draft => "draft",
            CanonStatus::Pending => "pending",
            CanonStatus::Canon => "canon",
            CanonStatus::NonCanon => "non-canon",
            CanonStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CanonStatus::Draft),
            "pending" => Some(CanonStatus::Pending),
            "canon" => Some(CanonStatus::Canon),
            "non-canon" => Some(CanonStatus::NonCanon),
            "archived" => Some(CanonStatus::Archived),
            _ => None,
        }
    }
}

/// A typed, directional connection between two admitted notes.
///
/// Edges are content-addressed on `(source, target, type_id)`; emitting
/// the same triple twice is a no-op everywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NoteId,
    pub target: NoteId,
    pub type_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl Edge {
    pub fn new(source: NoteId, target: NoteId, type_id: impl Into<String>) -> Self {
        Self {
            source,
            target,
            type_id: type_id.into(),
            properties: None,
        }
    }

    /// The identity triple used for dedup.
    pub fn key(&self) -> (NoteId, NoteId, String) {
        (self.source.clone(), self.target.clone(), self.type_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canon_status_round_trips() {
        for s in ["draft", "pending", "canon", "non-canon", "archived"] {
            let status = CanonStatus::parse(s).unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!(CanonStatus::parse("unknown").is_none());
    }

    #[test]
    fn edge_key_is_the_triple() {
        let e = Edge::new(NoteId::from("alice"), NoteId::from("bob"), "knows");
        assert_eq!(
            e.key(),
            (NoteId::from("alice"), NoteId::from("bob"), "knows".to_string())
        );
    }

}
