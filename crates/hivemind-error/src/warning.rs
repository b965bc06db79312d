//! Non-fatal conditions recorded while the pipeline keeps moving.

use std::path::PathBuf;

#[derive(Debug, Clone, thiserror::Error)]
pub enum WarningError {
    /// A wikilink whose target resolved to no known note.
    #[error("dangling link from {link_source} to {target}")]
    DanglingLink { link_source: String, target: String },

    /// A file that could not be parsed and was skipped.
    #[error("skipped unparseable file: {path}")]
    SkippedFile { path: PathBuf },

    /// The native watcher was lost; the poller took over.
    #[error("file watcher degraded to polling: {message}")]
    WatcherDegraded { message: String },

    /// Non-fatal storage-layer noise (e.g. a retried transient fault).
    #[error("storage warning: {0}")]
    Storage(String),
}
