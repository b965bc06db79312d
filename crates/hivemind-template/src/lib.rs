//! hivemind-template — the pluggable type system.
//!
//! A [`Template`] is a named, versioned catalog of entity types and
//! relationship types, loaded from configuration (or the built-in
//! `worldbuilding` catalog) and immutable for the process lifetime. The
//! [`TemplateRegistry`] validates candidates against the meta-schema,
//! holds the single active template, and serves lookups to the graph
//! builder and the tool generator. [`FolderMapper`] resolves vault paths
//! to entity-type candidates through ordered glob rules.

pub mod builtin;
pub mod mapper;
pub mod registry;
pub mod schema;
pub mod types;

pub use builtin::{fallback_inference, worldbuilding_template, FallbackEdge};
pub use mapper::{FolderMapper, MapConfidence, MapResult};
pub use registry::{TemplateRegistry, TemplateSource};
pub use schema::{CompiledSchema, Violation};
pub use types::{
    AllowSet, EntityTypeDef, FieldDef, FieldKind, FolderMappingRule, RelationshipTypeDef, Template,
};

use hivemind_error::DomainError;

/// Errors raised by template registration, activation, and lookups.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("template '{0}' is already registered")]
    DuplicateTemplate(String),

    #[error("template '{template}' declares entity type '{name}' more than once")]
    DuplicateEntityType { template: String, name: String },

    #[error("template '{template}' declares relationship '{id}' more than once")]
    DuplicateRelationship { template: String, id: String },

    /// Meta-schema violations, each rendered as `path: problem`.
    #[error("template '{template}' is invalid:\n{}", problems.join("\n"))]
    TemplateInvalid {
        template: String,
        problems: Vec<String>,
    },

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("unknown relationship type '{0}'")]
    UnknownRelationship(String),

    #[error("no active template")]
    NoActiveTemplate,

    #[error("invalid folder mapping pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl From<TemplateError> for hivemind_error::Error {
    fn from(value: TemplateError) -> Self {
        DomainError::Template {
            message: value.to_string(),
        }
        .into()
    }
}
