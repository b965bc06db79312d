//! hivemind-error — workspace-wide error types and severity classification.
//!
//! A single [`Error`] enum is shared across crates. Library code returns
//! [`Result`] and propagates with `?`; applications classify via
//! [`Error::severity`] to decide whether to continue (per-file issues),
//! surface (tool errors), or abort (configuration and corruption).

pub mod fatal;
pub mod severity;
pub mod warning;

pub use fatal::FatalError;
pub use severity::Severity;
pub use warning::WarningError;

/// Workspace-wide result alias used by all crates in the project.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type used across the hivemind workspace.
///
/// Variants group failures into coarse classes; see [`Error::severity`]
/// for programmatic classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Fatal(#[from] FatalError),
    #[error(transparent)]
    Warning(#[from] WarningError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured, non-fatal domain failures raised by individual subsystems.
///
/// Each variant carries a rendered message; the originating crate keeps a
/// richer typed error locally and converts at its boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    #[error("template error: {message}")]
    Template { message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("graph error: {message}")]
    Graph { message: String },

    #[error("search error: {message}")]
    Search { message: String },

    #[error("tool error: {message}")]
    Tool { message: String },

    #[error("io error: {message}")]
    Io { message: String },
}

impl Error {
    /// Returns true if this error is a Warning variant.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::Warning(_))
    }

    /// Coarse severity classification for programmatic handling.
    ///
    /// Typical usage: map severity to a log level, or decide whether a
    /// per-file loop continues or the whole command aborts.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Warning(_) => Severity::Warning,
            Error::Fatal(_) => Severity::Fatal,
            Error::Domain(_) | Error::Internal(_) => Severity::Error,
        }
    }
}
