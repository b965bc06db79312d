//! Parsed-document model.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fm_value::FmMap;

/// Stable identifier of an admitted note, taken from `frontmatter.id`.
///
/// Ids are user-authored strings (`alice`, `castle-of-glass`), not UUIDs;
/// the graph, storage, and tool layers all key on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        NoteId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        NoteId(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        NoteId(s)
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A wikilink as written in the body: `[[target]]` or `[[target|alias]]`.
/// The target is captured verbatim; resolution happens at graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wikilink {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Wikilink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            alias: None,
        }
    }

    pub fn aliased(target: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            alias: Some(alias.into()),
        }
    }
}

/// An ATX-style heading line with its level (1-6) and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Filesystem metadata captured at parse time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// A parsed Markdown document.
///
/// `id` is `None` when the frontmatter carries no non-empty `id`; such
/// notes are surfaced by validation but never admitted to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<NoteId>,
    pub path: PathBuf,
    pub file_name: String,
    pub frontmatter: FmMap,
    pub body: String,
    pub links: Vec<Wikilink>,
    pub headings: Vec<Heading>,
    pub stats: FileStats,
    /// Set when the file had no frontmatter block at all.
    pub missing_frontmatter: bool,
}

impl Note {
    /// The display title: frontmatter `name`/`title` if present, else the
    /// file stem.
    pub fn title(&self) -> String {
        for key in ["name", "title"] {
            if let Some(v) = self.frontmatter.get(key) {
                if let Some(s) = v.as_str() {
                    if !s.is_empty() {
                        return s.to_string();
                    }
                }
            }
        }
        self.file_name
            .strip_suffix(".md")
            .or_else(|| self.file_name.strip_suffix(".markdown"))
            .unwrap_or(&self.file_name)
            .to_string()
    }

    /// The declared entity type, if any.
    pub fn entity_type(&self) -> Option<&str> {
        self.frontmatter.get("type").and_then(|v| v.as_str())
    }

    /// The declared canon status, if any.
    pub fn status(&self) -> Option<&str> {
        self.frontmatter.get("status").and_then(|v| v.as_str())
    }
}
