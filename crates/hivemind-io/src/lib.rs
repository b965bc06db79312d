//! hivemind-io — vault enumeration, file watching, and atomic writes.
//!
//! The scanner feeds the initial build; the watcher streams debounced
//! change events for steady state. Neither interprets file contents.

pub mod scan;
pub mod watcher;
pub mod write;

pub use scan::{scan_vault, ScanOptions};
pub use watcher::{start_watcher, WatcherConfig};
pub use write::write_atomic;

use std::path::PathBuf;

use hivemind_error::DomainError;

/// Directory names never descended into, on top of the dot-dir rule.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", ".trash", ".obsidian"];

/// Errors raised by the filesystem layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IoError {
    #[error("vault root {0} is not a directory")]
    InvalidRoot(PathBuf),

    #[error("invalid exclude pattern '{pattern}': {message}")]
    InvalidExclude { pattern: String, message: String },

    #[error("failed to create file watcher: {0}")]
    CreateWatcher(String),

    #[error("failed to watch {path}: {message}")]
    Watch { path: PathBuf, message: String },

    #[error("io error on {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl From<IoError> for hivemind_error::Error {
    fn from(value: IoError) -> Self {
        DomainError::Io {
            message: value.to_string(),
        }
        .into()
    }
}

/// True for the Markdown extensions the pipeline indexes.
pub fn is_markdown(path: &std::path::Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    )
}
