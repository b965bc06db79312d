//! hivemind-db — the persistent storage engine.
//!
//! Truth lives here: a cozo database holding the `nodes`, `relationships`
//! and `meta` relations, plus an in-memory BM25 index over node text that
//! is updated in lockstep with node mutations. The in-memory graph
//! projection upstream is a cache of these tables.
//!
//! Every mutating operation runs as a single cozo script, which is one
//! transaction; cozo serialises writers internally while readers proceed
//! concurrently. Durability comes from [`Database::persist`], which
//! snapshots the store to `<vault>/.hivemind/vault.db`.

mod database;
mod error;
mod fts;
mod records;
mod schema;

pub use database::{Database, OpenState};
pub use error::DbError;
pub use fts::{FtsIndex, VaultTokenizer};
pub use records::{NodeFilters, NodeRecord, NodeRelationships, VaultStats};
pub use schema::SCHEMA_VERSION;

use std::path::{Path, PathBuf};

/// Directory under the vault root holding the persistent store.
pub const STORE_DIR: &str = ".hivemind";
/// The store file name.
pub const STORE_FILE: &str = "vault.db";

/// Canonical store path for a vault.
pub fn store_path(vault_root: &Path) -> PathBuf {
    vault_root.join(STORE_DIR).join(STORE_FILE)
}
