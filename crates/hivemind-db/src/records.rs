//! Row models exchanged with the store.

use hivemind_core::{Edge, FmMap, FmValue, Note, NoteId};
use serde::{Deserialize, Serialize};

use crate::DbError;

/// One row of the `nodes` relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NoteId,
    pub entity_type: String,
    pub status: Option<String>,
    pub title: String,
    pub body: String,
    pub frontmatter: FmMap,
    pub path: String,
    pub size: i64,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
}

impl NodeRecord {
    /// Build a row from an admitted note. Fails when the note has no id;
    /// unadmitted notes never reach storage.
    pub fn from_note(note: &Note) -> Result<Self, DbError> {
        let id = note
            .id
            .clone()
            .ok_or_else(|| DbError::Serialize("note has no id".to_string()))?;
        Ok(Self {
            id,
            entity_type: note.entity_type().unwrap_or("note").to_string(),
            status: note.status().map(str::to_string),
            title: note.title(),
            body: note.body.clone(),
            frontmatter: note.frontmatter.clone(),
            path: note.path.display().to_string(),
            size: note.stats.size as i64,
            created_at: note.stats.created.map(|t| t.to_rfc3339()),
            modified_at: note.stats.modified.map(|t| t.to_rfc3339()),
        })
    }

    /// The text fed to the full-text index: title, body, and the string
    /// values (including string arrays) of the frontmatter.
    pub fn fts_document(&self) -> String {
        let mut doc = String::with_capacity(self.title.len() + self.body.len() + 64);
        doc.push_str(&self.title);
        doc.push('\n');
        for (key, value) in &self.frontmatter {
            if key == "id" {
                continue;
            }
            match value {
                FmValue::String(s) => {
                    doc.push_str(s);
                    doc.push('\n');
                }
                FmValue::Array(items) => {
                    for item in items {
                        if let FmValue::String(s) = item {
                            doc.push_str(s);
                            doc.push('\n');
                        }
                    }
                }
                _ => {}
            }
        }
        doc.push_str(&self.body);
        doc
    }
}

/// Filters for `GetNodesByType`-style listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFilters {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Aggregate counts for `get_vault_stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VaultStats {
    pub nodes: usize,
    pub edges: usize,
    pub by_type: std::collections::BTreeMap<String, usize>,
}

/// Relationships of one node, partitioned by direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRelationships {
    pub outbound: Vec<Edge>,
    pub inbound: Vec<Edge>,
}
