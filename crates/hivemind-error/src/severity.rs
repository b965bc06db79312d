//! Coarse-grained classification for programmatic handling of errors.
//!
//! Typical mappings:
//! - Warning: non-fatal issues allowing forward progress
//! - Error: failures that should be handled or bubbled up
//! - Fatal: irrecoverable for the current command
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}
