//! File-change events flowing from the watcher into the indexer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Classification of a debounced file change.
///
/// Renames never appear here: the watcher surfaces them as a `Deleted`
/// for the old path followed by a `Created` for the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A coalesced change event carrying the final state for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl VaultEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
