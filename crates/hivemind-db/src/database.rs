//! The storage engine proper.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use cozo::{DataValue, Db, MemStorage, NamedRows, ScriptMutability};
use tracing::{debug, info, warn};

use hivemind_core::{Edge, NoteId};

use crate::records::NodeRelationships;
use crate::schema::{create_schema, read_schema_version, RELATIONS, SCHEMA_VERSION};
use crate::{DbError, FtsIndex, NodeFilters, NodeRecord, VaultStats};

const NODE_COLUMNS: &str =
    "id, entity_type, status, title, body, frontmatter, path, size, created_at, modified_at";
const EDGE_COLUMNS: &str = "source_id, target_id, type_id, properties";

const PERSIST_ATTEMPTS: u32 = 5;
const PERSIST_BACKOFF: Duration = Duration::from_millis(50);

/// How [`Database::open`] found the on-disk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    /// No usable snapshot; the caller must build from the vault.
    Fresh,
    /// Rows were restored from the snapshot.
    Restored,
}

/// Persistent node and relationship tables plus the full-text index.
#[derive(Debug)]
pub struct Database {
    db: Db<MemStorage>,
    fts: RwLock<FtsIndex>,
}

impl Database {
    /// Create an empty store with the current schema.
    pub fn init_with_schema() -> Result<Self, DbError> {
        let db = Db::new(MemStorage::default()).map_err(|e| DbError::Cozo(e.to_string()))?;
        create_schema(&db)?;
        Ok(Self {
            db,
            fts: RwLock::new(FtsIndex::default()),
        })
    }

    /// Open the store backing a vault.
    ///
    /// A snapshot written by a newer schema is refused (migration
    /// required). A stale or unreadable snapshot degrades to a fresh
    /// store with a warning; the caller rebuilds from the filesystem.
    pub fn open(path: &Path) -> Result<(Self, OpenState), DbError> {
        if !path.exists() {
            return Ok((Self::init_with_schema()?, OpenState::Fresh));
        }

        let store = Self::init_with_schema()?;
        let relations: Vec<String> = RELATIONS.iter().map(|s| s.to_string()).collect();
        if let Err(e) = store.db.import_from_backup(path, &relations) {
            warn!("store snapshot unreadable, rebuilding from vault: {e}");
            return Ok((Self::init_with_schema()?, OpenState::Fresh));
        }

        match read_schema_version(&store.db)? {
            Some(found) if found > SCHEMA_VERSION => {
                return Err(DbError::SchemaNewer {
                    found,
                    supported: SCHEMA_VERSION,
                })
            }
            Some(found) if found < SCHEMA_VERSION => {
                warn!(found, "stale store schema, rebuilding from vault");
                return Ok((Self::init_with_schema()?, OpenState::Fresh));
            }
            Some(_) => {}
            None => {
                warn!("store snapshot has no schema marker, rebuilding from vault");
                return Ok((Self::init_with_schema()?, OpenState::Fresh));
            }
        }

        store.rebuild_fts()?;
        info!("restored store from {}", path.display());
        Ok((store, OpenState::Restored))
    }

    /// Snapshot the store to disk. Written to a sibling temp file and
    /// renamed into place; transient faults retry with bounded
    /// exponential backoff.
    pub fn persist(&self, path: &Path) -> Result<(), DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbError::Backup(e.to_string()))?;
        }
        let tmp = path.with_extension("db.tmp");

        let mut last_err = String::new();
        for attempt in 1..=PERSIST_ATTEMPTS {
            let _ = std::fs::remove_file(&tmp);
            match self.db.backup_db(&tmp) {
                Ok(()) => {
                    return std::fs::rename(&tmp, path)
                        .map_err(|e| DbError::Backup(e.to_string()));
                }
                Err(e) => {
                    last_err = e.to_string();
                    warn!(attempt, "store snapshot failed, retrying: {last_err}");
                    std::thread::sleep(PERSIST_BACKOFF * 2u32.pow(attempt - 1));
                }
            }
        }
        Err(DbError::Backup(format!(
            "gave up after {PERSIST_ATTEMPTS} attempts: {last_err}"
        )))
    }

    fn run_mut(
        &self,
        script: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, ScriptMutability::Mutable)
            .map_err(|e| DbError::Cozo(e.to_string()))
    }

    fn run_ro(
        &self,
        script: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, ScriptMutability::Immutable)
            .map_err(|e| DbError::Cozo(e.to_string()))
    }

    // ---- nodes ----

    /// Insert or replace one node row; the full-text entry cascades.
    pub fn upsert_node(&self, record: &NodeRecord) -> Result<(), DbError> {
        let frontmatter = serde_json::to_string(&record.frontmatter)
            .map_err(|e| DbError::Serialize(e.to_string()))?;

        let mut params = BTreeMap::new();
        params.insert("id".into(), str_value(record.id.as_str()));
        params.insert("entity_type".into(), str_value(&record.entity_type));
        params.insert("status".into(), opt_str_value(record.status.as_deref()));
        params.insert("title".into(), str_value(&record.title));
        params.insert("body".into(), str_value(&record.body));
        params.insert("frontmatter".into(), str_value(&frontmatter));
        params.insert("path".into(), str_value(&record.path));
        params.insert("size".into(), DataValue::from(record.size));
        params.insert(
            "created_at".into(),
            opt_str_value(record.created_at.as_deref()),
        );
        params.insert(
            "modified_at".into(),
            opt_str_value(record.modified_at.as_deref()),
        );

        let script = format!(
            "?[{NODE_COLUMNS}] <- [[$id, $entity_type, $status, $title, $body, $frontmatter, $path, $size, $created_at, $modified_at]] \
             :put nodes {{id => entity_type, status, title, body, frontmatter, path, size, created_at, modified_at}}"
        );
        self.run_mut(&script, params)?;

        let mut fts = self.fts.write().map_err(|_| DbError::IndexPoisoned)?;
        fts.upsert(&record.id, &record.fts_document());
        debug!(id = %record.id, "upserted node");
        Ok(())
    }

    /// Remove a node and every edge touching it; the full-text entry
    /// cascades.
    pub fn delete_node(&self, id: &NoteId) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".into(), str_value(id.as_str()));
        let script = "
{ ?[id] <- [[$id]] :rm nodes {id} }
{
    ?[source_id, target_id, type_id] := *relationships{source_id, target_id, type_id}, source_id = $id
    :rm relationships {source_id, target_id, type_id}
}
{
    ?[source_id, target_id, type_id] := *relationships{source_id, target_id, type_id}, target_id = $id
    :rm relationships {source_id, target_id, type_id}
}";
        self.run_mut(script, params)?;

        let mut fts = self.fts.write().map_err(|_| DbError::IndexPoisoned)?;
        fts.remove(id);
        debug!(%id, "deleted node");
        Ok(())
    }

    pub fn get_node(&self, id: &NoteId) -> Result<Option<NodeRecord>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".into(), str_value(id.as_str()));
        let script = format!(
            "?[{NODE_COLUMNS}] := *nodes{{{NODE_COLUMNS}}}, id = $id"
        );
        let rows = self.run_ro(&script, params)?.rows;
        rows.first().map(row_to_node).transpose()
    }

    /// Case-folded title lookup, the fallback when a tool call's `id`
    /// names no node. Returns the first match by id order.
    pub fn get_node_by_title(&self, title: &str) -> Result<Option<NodeRecord>, DbError> {
        let mut params = BTreeMap::new();
        params.insert(
            "title_folded".into(),
            str_value(&title.trim().to_lowercase()),
        );
        let script = format!(
            "?[{NODE_COLUMNS}] := *nodes{{{NODE_COLUMNS}}}, folded = lowercase(title), folded = $title_folded\n:sort id\n:limit 1"
        );
        let rows = self.run_ro(&script, params)?.rows;
        rows.first().map(row_to_node).transpose()
    }

    /// Look a node up by its vault path (used when a deletion event only
    /// carries the path).
    pub fn node_id_for_path(&self, path: &str) -> Result<Option<NoteId>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("path".into(), str_value(path));
        let rows = self
            .run_ro(
                "?[id] := *nodes{id, path}, path = $path",
                params,
            )?
            .rows;
        Ok(rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.get_str())
            .map(NoteId::from))
    }

    pub fn nodes_by_type(
        &self,
        entity_type: &str,
        filters: &NodeFilters,
    ) -> Result<Vec<NodeRecord>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("entity_type".into(), str_value(entity_type));
        let mut script = format!(
            "?[{NODE_COLUMNS}] := *nodes{{{NODE_COLUMNS}}}, entity_type = $entity_type"
        );
        if let Some(status) = &filters.status {
            params.insert("status".into(), str_value(status));
            script.push_str(", status = $status");
        }
        script.push_str("\n:sort id");
        if filters.offset > 0 {
            script.push_str(&format!("\n:offset {}", filters.offset));
        }
        if let Some(limit) = filters.limit {
            script.push_str(&format!("\n:limit {limit}"));
        }
        let rows = self.run_ro(&script, params)?.rows;
        rows.iter().map(row_to_node).collect()
    }

    pub fn all_nodes(&self) -> Result<Vec<NodeRecord>, DbError> {
        let script = format!("?[{NODE_COLUMNS}] := *nodes{{{NODE_COLUMNS}}}\n:sort id");
        let rows = self.run_ro(&script, BTreeMap::new())?.rows;
        rows.iter().map(row_to_node).collect()
    }

    // ---- edges ----

    /// Insert one edge. The `(source, target, type)` triple is the
    /// primary key, so re-inserting an existing triple is a no-op.
    pub fn insert_edge(&self, edge: &Edge) -> Result<(), DbError> {
        let properties = match &edge.properties {
            Some(value) => DataValue::Str(
                serde_json::to_string(value)
                    .map_err(|e| DbError::Serialize(e.to_string()))?
                    .into(),
            ),
            None => DataValue::Null,
        };
        let mut params = BTreeMap::new();
        params.insert("source_id".into(), str_value(edge.source.as_str()));
        params.insert("target_id".into(), str_value(edge.target.as_str()));
        params.insert("type_id".into(), str_value(&edge.type_id));
        params.insert("properties".into(), properties);

        let script = format!(
            "?[{EDGE_COLUMNS}] <- [[$source_id, $target_id, $type_id, $properties]] \
             :put relationships {{source_id, target_id, type_id => properties}}"
        );
        self.run_mut(&script, params)?;
        Ok(())
    }

    /// Drop one edge by its identity triple.
    pub fn delete_edge(
        &self,
        source: &NoteId,
        target: &NoteId,
        type_id: &str,
    ) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("source_id".into(), str_value(source.as_str()));
        params.insert("target_id".into(), str_value(target.as_str()));
        params.insert("type_id".into(), str_value(type_id));
        let script = "?[source_id, target_id, type_id] <- [[$source_id, $target_id, $type_id]] \
                      :rm relationships {source_id, target_id, type_id}";
        self.run_mut(script, params)?;
        Ok(())
    }

    /// Drop every edge whose source is the given node.
    pub fn delete_edges_from(&self, id: &NoteId) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".into(), str_value(id.as_str()));
        let script = "
?[source_id, target_id, type_id] := *relationships{source_id, target_id, type_id}, source_id = $id
:rm relationships {source_id, target_id, type_id}";
        self.run_mut(script, params)?;
        Ok(())
    }

    /// Every edge touching the node, partitioned by direction.
    pub fn relationships(&self, id: &NoteId) -> Result<NodeRelationships, DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".into(), str_value(id.as_str()));
        let script = format!(
            "?[{EDGE_COLUMNS}] := *relationships{{{EDGE_COLUMNS}}}, source_id = $id or target_id = $id"
        );
        let rows = self.run_ro(&script, params)?.rows;

        let mut out = NodeRelationships::default();
        for row in &rows {
            let edge = row_to_edge(row)?;
            if edge.source == *id {
                out.outbound.push(edge);
            } else {
                out.inbound.push(edge);
            }
        }
        Ok(out)
    }

    pub fn all_edges(&self) -> Result<Vec<Edge>, DbError> {
        let script = format!("?[{EDGE_COLUMNS}] := *relationships{{{EDGE_COLUMNS}}}");
        let rows = self.run_ro(&script, BTreeMap::new())?.rows;
        rows.iter().map(row_to_edge).collect()
    }

    /// Node ids participating in at least one edge of the given type.
    pub fn participants(&self, type_id: &str) -> Result<HashSet<NoteId>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("type_id".into(), str_value(type_id));
        let rows = self
            .run_ro(
                "?[source_id, target_id] := *relationships{source_id, target_id, type_id}, type_id = $type_id",
                params,
            )?
            .rows;
        let mut out = HashSet::new();
        for row in &rows {
            if let Some(s) = row.first().and_then(|v| v.get_str()) {
                out.insert(NoteId::from(s));
            }
            if let Some(t) = row.get(1).and_then(|v| v.get_str()) {
                out.insert(NoteId::from(t));
            }
        }
        Ok(out)
    }

    /// 1-hop neighbours of a node, either direction.
    pub fn neighbors(&self, id: &NoteId) -> Result<Vec<NoteId>, DbError> {
        let rels = self.relationships(id)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for edge in rels.outbound.iter().chain(rels.inbound.iter()) {
            let other = if edge.source == *id {
                edge.target.clone()
            } else {
                edge.source.clone()
            };
            if seen.insert(other.clone()) {
                out.push(other);
            }
        }
        Ok(out)
    }

    // ---- search and stats ----

    /// BM25 search over title + body + frontmatter strings. Empty input
    /// matches nothing.
    pub fn full_text_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(NoteId, f32)>, DbError> {
        let fts = self.fts.read().map_err(|_| DbError::IndexPoisoned)?;
        Ok(fts.search(query, limit))
    }

    pub fn stats(&self) -> Result<VaultStats, DbError> {
        let type_rows = self
            .run_ro(
                "?[entity_type, count(id)] := *nodes{id, entity_type}",
                BTreeMap::new(),
            )?
            .rows;
        let mut by_type = std::collections::BTreeMap::new();
        let mut nodes = 0usize;
        for row in &type_rows {
            let ty = row
                .first()
                .and_then(|v| v.get_str())
                .unwrap_or_default()
                .to_string();
            let count = row.get(1).and_then(|v| v.get_int()).unwrap_or(0) as usize;
            nodes += count;
            by_type.insert(ty, count);
        }

        let edge_rows = self
            .run_ro(
                "?[count(source_id)] := *relationships{source_id, target_id, type_id}",
                BTreeMap::new(),
            )?
            .rows;
        let edges = edge_rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0) as usize;

        Ok(VaultStats {
            nodes,
            edges,
            by_type,
        })
    }

    /// Drop all rows (schema stays) and reset the full-text index. Used
    /// by `rebuild_index`.
    pub fn clear(&self) -> Result<(), DbError> {
        let script = "
{ ?[id] := *nodes{id} :rm nodes {id} }
{
    ?[source_id, target_id, type_id] := *relationships{source_id, target_id, type_id}
    :rm relationships {source_id, target_id, type_id}
}";
        self.run_mut(script, BTreeMap::new())?;
        let mut fts = self.fts.write().map_err(|_| DbError::IndexPoisoned)?;
        *fts = FtsIndex::default();
        Ok(())
    }

    /// Rebuild the full-text index from the node table, fitting avgdl to
    /// the corpus. Called after a restore.
    pub fn rebuild_fts(&self) -> Result<(), DbError> {
        let corpus: Vec<(NoteId, String)> = self
            .all_nodes()?
            .into_iter()
            .map(|record| {
                let doc = record.fts_document();
                (record.id, doc)
            })
            .collect();
        let mut fts = self.fts.write().map_err(|_| DbError::IndexPoisoned)?;
        *fts = FtsIndex::from_corpus(corpus);
        Ok(())
    }
}

fn str_value(s: &str) -> DataValue {
    DataValue::Str(s.into())
}

fn opt_str_value(s: Option<&str>) -> DataValue {
    match s {
        Some(s) => DataValue::Str(s.into()),
        None => DataValue::Null,
    }
}

fn row_str(row: &[DataValue], idx: usize) -> Result<String, DbError> {
    row.get(idx)
        .and_then(|v| v.get_str())
        .map(str::to_string)
        .ok_or_else(|| DbError::Cozo(format!("expected string at column {idx}")))
}

fn row_opt_str(row: &[DataValue], idx: usize) -> Option<String> {
    row.get(idx).and_then(|v| v.get_str()).map(str::to_string)
}

fn row_to_node(row: &Vec<DataValue>) -> Result<NodeRecord, DbError> {
    let frontmatter_raw = row_str(row, 5)?;
    let frontmatter =
        serde_json::from_str(&frontmatter_raw).map_err(|e| DbError::Serialize(e.to_string()))?;
    Ok(NodeRecord {
        id: NoteId::from(row_str(row, 0)?),
        entity_type: row_str(row, 1)?,
        status: row_opt_str(row, 2),
        title: row_str(row, 3)?,
        body: row_str(row, 4)?,
        frontmatter,
        path: row_str(row, 6)?,
        size: row.get(7).and_then(|v| v.get_int()).unwrap_or(0),
        created_at: row_opt_str(row, 8),
        modified_at: row_opt_str(row, 9),
    })
}

fn row_to_edge(row: &Vec<DataValue>) -> Result<Edge, DbError> {
    let properties = match row.get(3) {
        Some(DataValue::Str(s)) => Some(
            serde_json::from_str(s).map_err(|e| DbError::Serialize(e.to_string()))?,
        ),
        _ => None,
    };
    Ok(Edge {
        source: NoteId::from(row_str(row, 0)?),
        target: NoteId::from(row_str(row, 1)?),
        type_id: row_str(row, 2)?,
        properties,
    })
}
