//! Error types for hivemind-db.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("database error: {0}")]
    Cozo(String),

    #[error("item not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("store schema v{found} is newer than supported v{supported}")]
    SchemaNewer { found: u32, supported: u32 },

    #[error("store backup failed: {0}")]
    Backup(String),

    #[error("full-text index lock poisoned")]
    IndexPoisoned,
}

impl From<DbError> for hivemind_error::Error {
    fn from(value: DbError) -> Self {
        match value {
            DbError::SchemaNewer { found, supported } => {
                hivemind_error::FatalError::SchemaMigrationRequired { found, supported }.into()
            }
            other => hivemind_error::DomainError::Storage {
                message: other.to_string(),
            }
            .into(),
        }
    }
}
