//! Failures that abort the current command outright.

#[derive(Debug, Clone, thiserror::Error)]
pub enum FatalError {
    /// Missing or malformed configuration; maps to exit code 2.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The on-disk store is unreadable or fails integrity checks.
    /// Triggers a rebuild from the filesystem.
    #[error("database corruption detected: {message}")]
    DatabaseCorruption { message: String },

    /// The on-disk store was written by a newer schema than this build
    /// understands.
    #[error("store schema v{found} is newer than supported v{supported}; migration required")]
    SchemaMigrationRequired { found: u32, supported: u32 },

    /// A storage fault that persisted through every retry attempt.
    #[error("storage failure after {attempts} attempts: {message}")]
    StorageExhausted { attempts: u32, message: String },
}
