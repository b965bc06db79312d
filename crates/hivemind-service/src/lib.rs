//! hivemind-service — configuration, validation, fixing, and the
//! long-running indexer that ties the core crates together.

pub mod config;
pub mod fix;
pub mod observability;
pub mod service;
pub mod validate;

pub use config::{build_registry, Config, IndexingStrategy};
pub use fix::{apply_fixes, plan_fixes, FixChange, FixPlan};
pub use service::IndexerService;
pub use validate::{validate_vault, Issue, IssueKind, ValidateOptions, ValidationReport};

/// Exit code contract: 0 success, 1 validation errors, 2 configuration
/// errors.
pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const VALIDATION: i32 = 1;
    pub const CONFIG: i32 = 2;
}
